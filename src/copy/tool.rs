//! External mirror tool: program, argument layout and exit-code policy.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::parser::OutputTokens;
use crate::fs_ops::markers::MARKER_PREFIX;

/// Argument and exit-code conventions of the supported tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFlavor {
    /// `robocopy` (Windows). Exit codes below 8 mean success.
    Robocopy,
    /// `rsync`. Any nonzero exit code is a failure.
    Rsync,
}

impl ToolFlavor {
    pub fn failure_threshold(self) -> i32 {
        match self {
            ToolFlavor::Robocopy => 8,
            ToolFlavor::Rsync => 1,
        }
    }

    fn default_program(self) -> &'static str {
        match self {
            ToolFlavor::Robocopy => "robocopy",
            ToolFlavor::Rsync => "rsync",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MirrorTool {
    pub program: PathBuf,
    pub flavor: ToolFlavor,
    pub tokens: OutputTokens,
    /// Extra per-file and summary output. File-size and percent lines are
    /// printed either way.
    pub verbose: bool,
}

impl MirrorTool {
    /// Verbose in debug builds.
    pub fn new(flavor: ToolFlavor) -> Self {
        Self {
            program: PathBuf::from(flavor.default_program()),
            flavor,
            tokens: OutputTokens::default(),
            verbose: cfg!(debug_assertions),
        }
    }

    /// Robocopy on Windows, rsync elsewhere.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Self::new(ToolFlavor::Robocopy)
        } else {
            Self::new(ToolFlavor::Rsync)
        }
    }

    /// Same conventions, different executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_tokens(mut self, tokens: OutputTokens) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn display_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    pub fn is_success(&self, code: i32) -> bool {
        code < self.flavor.failure_threshold()
    }

    /// Mirror `source` into `target`. Marker files are excluded so a lock
    /// written into the target survives the purge.
    pub fn args(&self, source: &Path, target: &Path, threads: u32) -> Vec<OsString> {
        let marker_glob = format!("{MARKER_PREFIX}*");
        match self.flavor {
            ToolFlavor::Robocopy => {
                let mut args: Vec<OsString> = vec![source.into(), target.into()];
                args.extend(
                    [
                        "/MIR".to_string(),
                        "/COPYALL".into(),
                        "/DCOPY:DAT".into(),
                        "/R:0".into(),
                        "/W:0".into(),
                        "/XJ".into(),
                        "/Z".into(),
                        "/ZB".into(),
                        format!("/MT:{threads}"),
                        "/XF".into(),
                        marker_glob,
                    ]
                    .into_iter()
                    .map(OsString::from),
                );
                // Never /NFL or /NP: progress parsing needs file and percent lines.
                let extra: &[&str] = if self.verbose {
                    &["/V", "/FP"]
                } else {
                    &["/NJH"]
                };
                args.extend(extra.iter().map(OsString::from));
                args
            }
            ToolFlavor::Rsync => {
                let mut src = source.as_os_str().to_owned();
                src.push("/");
                let mut dst = target.as_os_str().to_owned();
                dst.push("/");
                // -A -X -H: ACLs, xattrs and hard links on top of -a.
                let mut args: Vec<OsString> = [
                    "-a",
                    "-A",
                    "-X",
                    "-H",
                    "--partial",
                    "--delete",
                    "--out-format=New File %l %n",
                ]
                .into_iter()
                .map(OsString::from)
                .collect();
                args.push(format!("--exclude={marker_glob}").into());
                if self.verbose {
                    args.push("--stats".into());
                }
                args.push(src);
                args.push(dst);
                args
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::parser::{LineKind, OutputParser};

    #[test]
    fn thresholds() {
        let robo = MirrorTool::new(ToolFlavor::Robocopy);
        assert!(robo.is_success(0));
        assert!(robo.is_success(7));
        assert!(!robo.is_success(8));
        let rsync = MirrorTool::new(ToolFlavor::Rsync);
        assert!(rsync.is_success(0));
        assert!(!rsync.is_success(1));
    }

    #[test]
    fn robocopy_args_exclude_markers() {
        let tool = MirrorTool::new(ToolFlavor::Robocopy);
        let args = tool.args(Path::new("C:/a"), Path::new("D:/b"), 8);
        assert_eq!(args[0], OsString::from("C:/a"));
        assert!(args.contains(&OsString::from("/MT:8")));
        assert!(args.contains(&OsString::from("/MIR")));
        let xf = args.iter().position(|a| a == "/XF").unwrap();
        assert_eq!(args[xf + 1], OsString::from(".linkmove-*"));
        assert!(!args.contains(&OsString::from("/NFL")));
        assert!(!args.contains(&OsString::from("/NP")));
    }

    #[test]
    fn verbosity_switch() {
        let quiet = MirrorTool::new(ToolFlavor::Robocopy).with_verbose(false);
        let args = quiet.args(Path::new("C:/a"), Path::new("D:/b"), 2);
        assert!(args.contains(&OsString::from("/NJH")));
        assert!(!args.contains(&OsString::from("/V")));

        let loud = quiet.with_verbose(true);
        let args = loud.args(Path::new("C:/a"), Path::new("D:/b"), 2);
        assert!(args.contains(&OsString::from("/V")));

        let rsync = MirrorTool::new(ToolFlavor::Rsync).with_verbose(true);
        assert!(rsync.args(Path::new("/a"), Path::new("/b"), 1).contains(&OsString::from("--stats")));
    }

    #[test]
    fn rsync_copies_contents() {
        let tool = MirrorTool::new(ToolFlavor::Rsync).with_program("/opt/bin/rsync");
        let args = tool.args(Path::new("/src"), Path::new("/dst"), 4);
        assert_eq!(args[args.len() - 2], OsString::from("/src/"));
        assert_eq!(args[args.len() - 1], OsString::from("/dst/"));
        assert!(args.contains(&OsString::from("--exclude=.linkmove-*")));
        for flag in ["-a", "-A", "-X", "-H", "--partial", "--delete"] {
            assert!(args.contains(&OsString::from(flag)), "missing {flag}");
        }
        assert_eq!(tool.display_name(), "rsync");

        // Directory entries from --out-format carry inode sizes, not payload.
        let mut parser = OutputParser::new(tool.tokens.clone());
        assert_eq!(parser.feed("New File 4096 saves/"), LineKind::Other);
        assert_eq!(parser.feed("New File 100 saves/slot1.sav"), LineKind::NewFile(100));
        assert_eq!(parser.feed("New File 4096 ./"), LineKind::Other);
        assert_eq!(parser.feed("New File 50 game.bin"), LineKind::NewFile(50));
        assert_eq!(parser.cumulative_bytes(), 100);
    }
}
