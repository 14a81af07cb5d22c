use crate::areas::repository::Repository;
use crate::artifacts::status::status_info::StatusReport;

impl Repository {
    /// Compare HEAD, the index and the working tree
    ///
    /// Refreshed stat data of unchanged files is written back to the index.
    pub async fn status(&self) -> anyhow::Result<StatusReport> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let report = self.status_inspector().initialize(&mut index)?;

        if index.is_changed() {
            index.write_updates()?;
        }

        Ok(report)
    }
}
