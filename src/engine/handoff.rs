//! Text formats shared with the external installer.

use std::path::Path;

use crate::config::HandoffFlavor;
use crate::engine::state::InstallerOutcome;

pub const RUN_MODE_INSTALL: &str = "install";

/// Ordered handoff pairs for an install run.
pub fn install_args(project_root: &Path, version: &str) -> Vec<(String, String)> {
    vec![
        ("RUN_MODE".to_owned(), RUN_MODE_INSTALL.to_owned()),
        ("PROJECT".to_owned(), project_root.display().to_string()),
        ("VERSION".to_owned(), version.to_owned()),
    ]
}

/// One directive per line, in the order given.
pub fn render_args(flavor: HandoffFlavor, args: &[(String, String)]) -> String {
    let mut out = String::new();
    for (key, value) in args {
        let line = match flavor {
            HandoffFlavor::Posix => format!("export {key}={}", posix_quote(value)),
            HandoffFlavor::Windows => format!("set {key}={value}"),
        };
        out.push_str(&line);
        out.push_str(line_ending(flavor));
    }
    out
}

/// Script that loads the argument file and runs the installer.
pub fn command_script(flavor: HandoffFlavor, installer_script: &Path) -> String {
    let script = installer_script.display();
    match flavor {
        HandoffFlavor::Posix => format!(
            "#!/bin/sh\n\
             cd \"$(dirname \"$0\")\" || exit 1\n\
             . ./args\n\
             python3 \"{script}\" \"$RUN_MODE\" --proj \"$PROJECT\" --version \"$VERSION\"\n"
        ),
        HandoffFlavor::Windows => format!(
            "@echo off\r\n\
             cd /d \"%~dp0\"\r\n\
             call args.bat\r\n\
             python \"{script}\" %RUN_MODE% --proj \"%PROJECT%\" --version %VERSION%\r\n"
        ),
    }
}

/// Parse the installer's `log.txt` (`success: ...` / `failed: ...`).
pub fn parse_outcome(text: &str) -> InstallerOutcome {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if let Some(rest) = line.strip_prefix("success:") {
        InstallerOutcome::Succeeded(rest.trim().to_owned())
    } else if let Some(rest) = line.strip_prefix("failed:") {
        InstallerOutcome::Failed(rest.trim().to_owned())
    } else {
        InstallerOutcome::Unknown
    }
}

fn line_ending(flavor: HandoffFlavor) -> &'static str {
    match flavor {
        HandoffFlavor::Posix => "\n",
        HandoffFlavor::Windows => "\r\n",
    }
}

fn posix_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:@%,".contains(c));
    if plain {
        value.to_owned()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
