//! Command execution. Output goes to the supplied writer.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tabmate_cache::CacheConfig;
use tabmate_core::{ExportData, Store};

use crate::Command;

pub(crate) async fn run<W: Write>(command: Command, store: &Store, cache: &CacheConfig, out: &mut W) -> Result<()> {
    match command {
        Command::Info => info(store, cache, out).await,
        Command::Export { output } => export(store, output.as_deref(), out).await,
        Command::Import { file, overwrite } => import(store, &file, overwrite, out).await,
        Command::Clear { yes } => clear(store, yes, out).await,
        Command::Tasks => tasks(store, out).await,
        Command::Match { domain } => match_domain(store, &domain, out).await,
    }
}

async fn info<W: Write>(store: &Store, cache: &CacheConfig, out: &mut W) -> Result<()> {
    let info = store.get_storage_info().await?;
    let report = serde_json::json!({
        "storage": info,
        "runtime_cache": cache,
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

async fn export<W: Write>(store: &Store, output: Option<&Path>, out: &mut W) -> Result<()> {
    let data = store.export_all_data().await?;
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), tasks = data.tasks.len(), "Exported store");
            writeln!(
                out,
                "exported {} tasks and {} patterns to {}",
                data.tasks.len(),
                data.patterns.len(),
                path.display()
            )?;
        }
        None => writeln!(out, "{json}")?,
    }
    Ok(())
}

async fn import<W: Write>(store: &Store, file: &Path, overwrite: bool, out: &mut W) -> Result<()> {
    let raw = std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    let data: ExportData =
        serde_json::from_str(&raw).with_context(|| format!("{} is not a tabmate export", file.display()))?;

    let summary = store.import_all_data(data, overwrite).await?;
    writeln!(
        out,
        "imported {} tasks, {} patterns, {} usage stats{}",
        summary.tasks,
        summary.patterns,
        summary.usage_stats,
        if summary.preferences_replaced { ", preferences replaced" } else { "" }
    )?;
    Ok(())
}

async fn clear<W: Write>(store: &Store, yes: bool, out: &mut W) -> Result<()> {
    if !yes {
        bail!("refusing to clear all data without --yes");
    }
    store.clear_all_data().await?;
    writeln!(out, "all data cleared")?;
    Ok(())
}

async fn tasks<W: Write>(store: &Store, out: &mut W) -> Result<()> {
    let tasks = store.get_all_tasks().await?;
    if tasks.is_empty() {
        writeln!(out, "no tasks")?;
    }
    for task in tasks.values() {
        let state = if task.is_enabled { "enabled" } else { "disabled" };
        let patterns = task.website_patterns.join(",");
        writeln!(out, "{}\t{}\t{}\tused {}x\t{}", task.id, task.name, state, task.usage_count, patterns)?;
    }
    Ok(())
}

async fn match_domain<W: Write>(store: &Store, domain: &str, out: &mut W) -> Result<()> {
    if store.is_domain_excluded(domain).await? {
        writeln!(out, "{domain} is excluded by privacy settings")?;
        return Ok(());
    }

    let matched = store.get_tasks_for_domain(domain).await?;
    if matched.is_empty() {
        writeln!(out, "no tasks match {domain}")?;
    }
    for task in matched {
        writeln!(out, "{}\t{}", task.id, task.name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabmate_core::{NewTask, PreferencesUpdate, PrivacySettings, StoreSettings};

    async fn store() -> Store {
        Store::ephemeral(StoreSettings { encryption_enabled: false, ..Default::default() }).await.unwrap()
    }

    async fn output(command: Command, store: &Store) -> String {
        let mut out = Vec::new();
        run(command, store, &CacheConfig::default(), &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    fn task(name: &str, pattern: &str) -> NewTask {
        NewTask {
            name: name.into(),
            prompt_template: "Summarize {{content}}".into(),
            website_patterns: vec![pattern.into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_info_reports_cache_settings() {
        let store = store().await;
        let text = output(Command::Info, &store).await;
        let report: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(report["storage"]["task_count"], 0);
        assert_eq!(report["runtime_cache"]["eviction_strategy"], "lru");
    }

    #[tokio::test]
    async fn test_clear_requires_confirmation() {
        let store = store().await;
        let mut out = Vec::new();
        let result = run(Command::Clear { yes: false }, &store, &CacheConfig::default(), &mut out).await;
        assert!(result.is_err());

        assert_eq!(output(Command::Clear { yes: true }, &store).await.trim(), "all data cleared");
    }

    #[tokio::test]
    async fn test_match_lists_tasks() {
        let store = store().await;
        store.create_task(task("News digest", r"news\.example\.com")).await.unwrap();
        store.create_task(task("Docs helper", r"docs\.rs")).await.unwrap();

        let text = output(Command::Match { domain: "news.example.com".into() }, &store).await;
        assert!(text.contains("News digest"));
        assert!(!text.contains("Docs helper"));

        let none = output(Command::Match { domain: "other.org".into() }, &store).await;
        assert_eq!(none.trim(), "no tasks match other.org");
    }

    #[tokio::test]
    async fn test_match_respects_exclusions() {
        let store = store().await;
        store.create_task(task("News digest", r"example\.com")).await.unwrap();
        let privacy = PrivacySettings {
            excluded_domains: ["example.com".to_string()].into_iter().collect(),
            ..Default::default()
        };
        store
            .update_preferences(PreferencesUpdate { privacy: Some(privacy), ..Default::default() })
            .await
            .unwrap();

        let text = output(Command::Match { domain: "example.com".into() }, &store).await;
        assert!(text.contains("excluded"));
    }

    #[tokio::test]
    async fn test_export_then_import_file() {
        let source = store().await;
        source.create_task(task("News digest", "example")).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        let text = output(Command::Export { output: Some(path.clone()) }, &source).await;
        assert!(text.starts_with("exported 1 tasks"));

        let target = store().await;
        let text = output(Command::Import { file: path, overwrite: false }, &target).await;
        assert!(text.starts_with("imported 1 tasks"));
        assert_eq!(target.get_all_tasks().await.unwrap().len(), 1);

        let listing = output(Command::Tasks, &target).await;
        assert!(listing.contains("News digest\tenabled"));
    }

    #[tokio::test]
    async fn test_import_rejects_garbage() {
        let store = store().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"not\": \"an export\"}").unwrap();

        let mut out = Vec::new();
        let result =
            run(Command::Import { file: path, overwrite: true }, &store, &CacheConfig::default(), &mut out).await;
        assert!(result.is_err());
    }
}
