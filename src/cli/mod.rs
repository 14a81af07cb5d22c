pub mod pager;
pub mod render;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "grove",
    version,
    about = "A content-addressed version control core",
    long_about = "grove tracks snapshots of a working tree in a content-addressed object \
    database, keeps branches and tags as refs, links nested repositories as submodules and \
    synchronizes history with remotes.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
"
)]
pub struct Cli {
    /// Run as if started in this directory
    #[arg(short = 'C', global = true, value_name = "PATH")]
    pub directory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(name = "init", about = "Create an empty repository or reinitialize an existing one")]
    Init {
        #[arg(index = 1, help = "Where to create the repository")]
        path: Option<PathBuf>,
    },
    #[command(name = "cat-file", about = "Print the content of an object")]
    CatFile {
        #[arg(short = 'p', long, help = "Object id, abbreviated id or revision")]
        object: String,
    },
    #[command(name = "hash-object", about = "Compute the blob id of a file")]
    HashObject {
        #[arg(short, long, help = "Also store the blob in the object database")]
        write: bool,
        #[arg(index = 1)]
        file: PathBuf,
    },
    #[command(name = "ls-tree", about = "List the entries of a tree")]
    LsTree {
        #[arg(short, long, help = "Descend into subtrees")]
        recursive: bool,
        #[arg(index = 1, default_value = "HEAD")]
        revision: String,
    },
    #[command(name = "write-tree", about = "Store the index as a tree and print its id")]
    WriteTree,
    #[command(name = "add", about = "Stage file contents")]
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    #[command(name = "rm", about = "Untrack files")]
    Rm {
        #[arg(long, help = "Keep the files in the working tree")]
        cached: bool,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    #[command(name = "commit", about = "Record the index as a new commit")]
    Commit {
        #[arg(short, long, help = "The commit message")]
        message: String,
        #[arg(long, value_name = "NAME <EMAIL>", help = "Override the author")]
        author: Option<String>,
        #[arg(long, help = "Allow a commit that changes nothing")]
        allow_empty: bool,
    },
    #[command(name = "status", about = "Show the working tree status")]
    Status {
        #[arg(long, help = "Machine-readable two-letter codes")]
        porcelain: bool,
    },
    #[command(name = "branch", about = "List, create or delete branches")]
    Branch {
        #[arg(index = 1)]
        name: Option<String>,
        #[arg(index = 2, help = "Start point, HEAD by default")]
        start: Option<String>,
        #[arg(short, long, help = "Delete the branch")]
        delete: bool,
        #[arg(short, long, help = "Move the branch if it exists")]
        force: bool,
        #[arg(short, long, help = "Follow the start point as upstream")]
        track: bool,
    },
    #[command(name = "tag", about = "List or create tags")]
    Tag {
        #[arg(index = 1)]
        name: Option<String>,
        #[arg(index = 2)]
        target: Option<String>,
        #[arg(short, long, help = "Create an annotated tag with this message")]
        message: Option<String>,
        #[arg(short, long)]
        force: bool,
    },
    #[command(name = "checkout", about = "Switch branches or detach HEAD at a revision")]
    Checkout {
        #[arg(index = 1)]
        target: String,
    },
    #[command(name = "log", about = "Show commit history")]
    Log {
        #[arg(long, help = "One line per commit")]
        oneline: bool,
        revisions: Vec<String>,
    },
    #[command(name = "merge", about = "Join another history into the current branch")]
    Merge {
        #[arg(index = 1)]
        target: String,
        #[arg(short, long)]
        message: Option<String>,
    },
    #[command(name = "remote", about = "Manage remotes")]
    Remote {
        #[command(subcommand)]
        command: Option<RemoteCommands>,
    },
    #[command(name = "clone", about = "Clone a repository into a new directory")]
    Clone {
        #[arg(index = 1)]
        uri: String,
        #[arg(index = 2, id = "clone_directory", value_name = "DIRECTORY")]
        directory: Option<PathBuf>,
    },
    #[command(name = "fetch", about = "Download objects and refs from a remote")]
    Fetch {
        #[arg(index = 1, default_value = "origin")]
        remote: String,
    },
    #[command(name = "push", about = "Update remote refs")]
    Push {
        #[arg(index = 1, default_value = "origin")]
        remote: String,
        #[arg(index = 2)]
        refspecs: Vec<String>,
        #[arg(short, long)]
        force: bool,
    },
    #[command(name = "pull", about = "Fetch the upstream and merge it")]
    Pull,
    #[command(name = "submodule", about = "Manage nested repositories")]
    Submodule {
        #[command(subcommand)]
        command: Option<SubmoduleCommands>,
    },
}

#[derive(Subcommand)]
pub enum RemoteCommands {
    Add { name: String, url: String },
    List,
}

#[derive(Subcommand)]
pub enum SubmoduleCommands {
    Add { url: String, path: PathBuf },
    Status,
    Update { path: Option<PathBuf> },
    /// Stage the nested repository's current HEAD as the new pin
    #[command(name = "record-pin")]
    RecordPin { path: PathBuf },
}
