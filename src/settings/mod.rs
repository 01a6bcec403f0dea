use std::path::PathBuf;

use clap::Parser;
use dropscene_resolver::coordinator::ResolverOptions;
use dropscene_resolver::entry::walker::WalkOptions;

#[derive(Parser, Debug)]
#[command(name = "dropscene")]
#[command(version)]
#[command(about = "Resolves a dropped glTF scene (manifest, buffers and images, or a .glb) into one document")]
pub struct CliArgs {
    /// The dropped files and directories, in drop order.
    #[arg(required = true, value_delimiter = ',', env = "DROPSCENE_PATHS")]
    pub paths: Vec<PathBuf>,

    /// Where to write the resolved scene. Without it, only the report is printed.
    #[arg(long, short, env = "DROPSCENE_OUTPUT")]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        env = "DROPSCENE_KEEP_HANDLES",
        help = "Write the in-memory handle URIs instead of embedding resources as data: URIs. Only useful for debugging, the handles are meaningless outside of this process."
    )]
    pub keep_handles: bool,

    /// Also walk hidden files and OS bookkeeping entries (.DS_Store, __MACOSX, ...) inside dropped directories.
    #[arg(long, env = "DROPSCENE_INCLUDE_SYSTEM_FILES")]
    pub include_system_files: bool,

    /// Number of entries per directory listing page.
    #[arg(long, default_value_t = 64, env = "DROPSCENE_PAGE_SIZE", value_parser = clap::value_parser!(u16).range(1..))]
    pub page_size: u16,

    /// Give up on the drop after this many seconds.
    #[arg(long, env = "DROPSCENE_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,
}

impl CliArgs {
    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            walk: WalkOptions {
                skip_system_entries: !self.include_system_files,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["dropscene", "scene.gltf", "assets"]).unwrap();
        assert_eq!(args.paths, [PathBuf::from("scene.gltf"), PathBuf::from("assets")]);
        assert_eq!(args.page_size, 64);
        assert!(args.output.is_none());
        assert!(!args.keep_handles);
        assert!(args.resolver_options().walk.skip_system_entries);
    }

    #[test]
    fn rejects_empty_pages() {
        assert!(CliArgs::try_parse_from(["dropscene", "--page-size", "0", "scene.gltf"]).is_err());
    }

    #[test]
    fn system_files_can_be_included() {
        let args = CliArgs::try_parse_from(["dropscene", "--include-system-files", "drop"]).unwrap();
        assert!(!args.resolver_options().walk.skip_system_entries);
    }
}
