use crate::aggregate::merge_permissions;
use crate::config::AuditConfig;
use crate::display;
use crate::error::Result;
use crate::github::{GithubClient, MembersQuery, RepositoriesQuery};
use crate::model::{Members, Repository};
use crate::report::Report;
use chrono::Utc;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct AuditSummary {
    pub organization: String,
    pub report_path: String,
    pub generated_at: String,
    pub members: u64,
    pub repositories: u64,
    pub archived_repositories: usize,
    pub members_without_2fa: Vec<String>,
    pub outside_collaborator_edges: usize,
    pub permission_cells: Vec<PermissionCount>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PermissionCount {
    pub permission: String,
    pub count: usize,
}

/// connect → members → repositories → aggregate → sort → write, each to completion.
pub async fn run(config: &AuditConfig) -> Result<()> {
    display::step(config.json, "Connecting...");
    let client = GithubClient::new(config)?;

    display::step(config.json, "Fetching members...");
    let mut members = Members::new();
    let total_members = client.fetch_all::<MembersQuery, _>(&mut members).await?;
    if members.is_empty() {
        display::warn(&format!("No members found in {}.", config.organization));
    }

    display::step(config.json, "Fetching repositories...");
    let mut repositories: Vec<Repository> = Vec::new();
    let total_repos = client
        .fetch_all::<RepositoriesQuery, _>(&mut repositories)
        .await?;

    let aggregation = merge_permissions(&mut members, &repositories);
    let report = Report::new(aggregation.columns, members);

    let path = config.report_path();
    report.save(&path)?;

    let summary = AuditSummary {
        organization: config.organization.clone(),
        report_path: path.display().to_string(),
        generated_at: Utc::now().to_rfc3339(),
        members: total_members,
        repositories: total_repos,
        archived_repositories: repositories.iter().filter(|r| r.is_archived).count(),
        members_without_2fa: members_without_2fa(&report),
        outside_collaborator_edges: aggregation.outside_edges,
        permission_cells: permission_counts(&report),
    };

    display::output(config.json, &summary, |data| {
        render_summary(data);
    });

    Ok(())
}

fn members_without_2fa(report: &Report) -> Vec<String> {
    report
        .rows()
        .iter()
        .filter(|m| m.two_factor_enabled == Some(false))
        .map(|m| m.login.clone())
        .collect()
}

fn permission_counts(report: &Report) -> Vec<PermissionCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for member in report.rows() {
        for permission in member.permissions.values() {
            *counts.entry(permission.as_str()).or_insert(0) += 1;
        }
    }
    let mut counts: Vec<PermissionCount> = counts
        .into_iter()
        .map(|(permission, count)| PermissionCount {
            permission: permission.to_string(),
            count,
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

fn render_summary(summary: &AuditSummary) {
    display::section_header(&format!("Access Audit: {}", summary.organization));

    println!("  {} {}", "Members:".bold(), summary.members);
    println!(
        "  {} {} ({} archived)",
        "Repositories:".bold(),
        summary.repositories,
        summary.archived_repositories
    );
    println!(
        "  {} {}",
        "Outside collaborator entries ignored:".bold(),
        summary.outside_collaborator_edges
    );

    if summary.permission_cells.is_empty() {
        display::warn("No member holds a repository permission.");
    } else {
        let mut table = display::new_table(&["Permission", "Grants"]);
        for p in &summary.permission_cells {
            table.add_row(vec![&p.permission, &p.count.to_string()]);
        }
        println!("\n{table}");
    }

    if !summary.members_without_2fa.is_empty() {
        display::warn(&format!(
            "{} member(s) without two-factor authentication: {}",
            summary.members_without_2fa.len(),
            summary.members_without_2fa.join(", ")
        ));
    }

    println!(
        "\nCompleted audit of {} members and {} repositories.",
        summary.members, summary.repositories
    );
    display::success(&format!("CSV written to: {}", summary.report_path));
}
