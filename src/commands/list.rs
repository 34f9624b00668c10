use anyhow::Result;
use log::debug;

use crate::{package::PackageDescriptor, runtime::Runtime};

use super::services::Services;

const HEADERS: [&str; 6] = ["IDENTITY", "NAME", "INSTALLED", "LATEST", "STATUS", "ENABLED"];

/// Print every tracked package, core first
#[tracing::instrument(skip(services))]
pub async fn list<R: Runtime + 'static>(services: &Services<R>, json: bool) -> Result<()> {
    let packages = services.manager.list_all().await?;
    debug!("Listing {} package(s)", packages.len());

    if json {
        println!("{}", serde_json::to_string_pretty(&packages)?);
    } else {
        print!("{}", render_table(&packages));
    }
    Ok(())
}

pub(crate) fn render_table(packages: &[PackageDescriptor]) -> String {
    let rows: Vec<[String; 6]> = packages.iter().map(row).collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &HEADERS.map(String::from), &widths);
    for row in &rows {
        push_line(&mut out, row, &widths);
    }

    if let Some(core) = packages.iter().find(|p| p.core_update_available()) {
        out.push_str(&format!(
            "\nCore update available: {} -> {}. Run `modman update-core` to apply it.\n",
            core.local_version.as_deref().unwrap_or("-"),
            core.remote_version
        ));
    }
    out
}

fn row(package: &PackageDescriptor) -> [String; 6] {
    [
        package.identity.clone(),
        package.display_name.clone(),
        package.local_version.clone().unwrap_or_else(|| "-".into()),
        package.remote_version.to_string(),
        package.status.to_string(),
        if package.enabled { "yes" } else { "no" }.to_string(),
    ]
}

fn push_line(out: &mut String, cells: &[String; 6], widths: &[usize; 6]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{RemoteVersion, Status};

    fn descriptor(identity: &str, local: Option<&str>, remote: &str, status: Status) -> PackageDescriptor {
        PackageDescriptor {
            identity: identity.into(),
            repo: format!("light-worx/{}", identity),
            display_name: identity.into(),
            description: String::new(),
            remote_version: RemoteVersion::Known(remote.into()),
            local_version: local.map(String::from),
            download_url: None,
            is_core: identity == "connexion",
            installed: local.is_some(),
            enabled: local.is_some(),
            status,
        }
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let packages = vec![
            descriptor("connexion", Some("v1.0.0"), "v1.0.0", Status::Installed),
            descriptor("connexion-people", None, "v0.3.0", Status::NotInstalled),
        ];

        let table = render_table(&packages);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("IDENTITY          NAME"));
        assert!(lines[1].starts_with("connexion         connexion"));
        assert!(lines[2].contains("-  "));
        assert!(lines[2].ends_with("not_installed  no"));
        assert!(!table.contains("Core update available"));
    }

    #[test]
    fn test_render_table_mentions_core_update() {
        let core = descriptor("connexion", Some("v1.0.0"), "v1.1.0", Status::Installed);

        let table = render_table(&[core]);
        assert!(table.contains("Core update available: v1.0.0 -> v1.1.0"));
    }

    #[test]
    fn test_render_unknown_remote() {
        let mut package = descriptor("connexion-worship", None, "", Status::NotInstalled);
        package.remote_version = RemoteVersion::Unknown;

        let table = render_table(&[package]);
        assert!(table.lines().nth(1).unwrap().contains("unknown"));
    }
}
