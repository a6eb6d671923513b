//! Inno Setup script generation.
//!
//! The user's template is emitted verbatim, followed by a `[Dirs]` and a
//! `[Files]` section rendered with Handlebars.

use super::utils;
use crate::packer::{error::Result, path::PackPath};
use handlebars::Handlebars;
use serde::Serialize;
use std::path::Path;

/// Sections appended after the user template.
pub const SECTIONS_TEMPLATE: &str = r#"{{template}}

[Dirs]
{{#each dirs}}Name: "{app}/{{this}}"
{{/each}}

[Files]
Source: "{{artifact}}"; DestDir: "{app}"
{{#each files}}Source: "{{this.source}}"; DestDir: "{app}{{this.dest_dir}}"
{{/each}}
"#;

/// One file installation declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerFile {
    /// Absolute source path on the build host.
    pub source: PackPath,
    /// Target path relative to the install directory.
    pub target: PackPath,
}

#[derive(Serialize)]
struct FileLine {
    source: String,
    dest_dir: String,
}

#[derive(Serialize)]
struct ScriptData<'a> {
    template: &'a str,
    artifact: String,
    dirs: Vec<String>,
    files: Vec<FileLine>,
}

/// Render the complete script.
pub fn render(
    template: &str,
    artifact: &Path,
    dirs: &[PackPath],
    files: &[InstallerFile],
) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.register_template_string("installer.iss", SECTIONS_TEMPLATE)?;

    let data = ScriptData {
        template: template.trim_end(),
        artifact: utils::quote(&artifact.display().to_string()),
        dirs: dirs.iter().map(|d| utils::quote(&d.to_posix())).collect(),
        files: files
            .iter()
            .map(|file| {
                let dir = file.target.dirname();
                FileLine {
                    source: utils::quote(file.source.as_str()),
                    dest_dir: if dir.is_current_dir() {
                        String::new()
                    } else {
                        format!("/{}", utils::quote(&dir.to_posix()))
                    },
                }
            })
            .collect(),
    };

    Ok(handlebars.render("installer.iss", &data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(source: &str, target: &str) -> InstallerFile {
        InstallerFile {
            source: PackPath::new(source),
            target: PackPath::new(target),
        }
    }

    #[test]
    fn test_render_sections() {
        let script = render(
            "[Setup]\nAppName=Hello\n",
            Path::new("/tmp/staging/hello.exe"),
            &[PackPath::new("src"), PackPath::new("lib/ruby")],
            &[
                file("/home/me/app/hello.rb", "src/hello.rb"),
                file("/home/me/app/README", "README"),
            ],
        )
        .unwrap();

        assert!(script.starts_with("[Setup]\nAppName=Hello\n"));
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines.iter().filter(|l| l.starts_with("Name:")).count(), 2);
        assert_eq!(lines.iter().filter(|l| l.starts_with("Source:")).count(), 3);
        assert!(lines.contains(&r#"Name: "{app}/lib/ruby""#));
        assert!(lines.contains(&r#"Source: "/tmp/staging/hello.exe"; DestDir: "{app}""#));
        assert!(lines.contains(&r#"Source: "/home/me/app/hello.rb"; DestDir: "{app}/src""#));
        assert!(lines.contains(&r#"Source: "/home/me/app/README"; DestDir: "{app}""#));
        let dirs_at = lines.iter().position(|l| *l == "[Dirs]").unwrap();
        let files_at = lines.iter().position(|l| *l == "[Files]").unwrap();
        assert!(dirs_at < files_at);
    }

    #[test]
    fn test_render_doubles_quotes() {
        let script = render(
            "",
            Path::new("out.exe"),
            &[],
            &[file(r#"C:\a "b"\c.rb"#, "src/c.rb")],
        )
        .unwrap();
        assert!(script.contains(r#"Source: "C:\a ""b""\c.rb"; DestDir: "{app}/src""#));
    }
}
