//! Rendering of orchestrator reports and materialization events.

use std::path::Path;

use colored::Colorize;

use buildsetup_sync::{Event, FileDiff, SourceChange, SourceDiff, StatusReport};

/// Print the `status` view of a build directory.
pub fn print_status(report: &StatusReport, with_sources: bool) {
    let dir = report.build_dir.display();
    if !report.changed() {
        println!("Configuration in {dir} has not changed.");
        return;
    }

    if !report.applied {
        println!("Configuration in {dir} has not been fully applied yet.");
    } else {
        println!("Configuration in {dir} has changed:");
        if report.document.changed {
            print_text(&report.document.text);
        }
    }

    if with_sources {
        for source in report.sources.iter().filter(|s| s.changed()) {
            print_source(source);
        }
    }
}

fn print_source(source: &SourceDiff) {
    let dir = source.layer_dir.display();
    match &source.change {
        SourceChange::Unchanged { .. } => {}
        SourceChange::Added { commit } => println!(
            "Layer repository {} will be checked out into {dir} at revision {} ({})",
            source.url,
            source.revision,
            short(commit)
        ),
        SourceChange::Removed { .. } => println!(
            "Layer repository {} in {dir} is no longer part of the configuration",
            source.url
        ),
        SourceChange::Missing { .. } => println!(
            "Layer repository {} is missing from {dir} and will be checked out again",
            source.url
        ),
        SourceChange::Moved { from, to } => {
            print_layer_moved(&source.url, &source.layer_dir, &source.revision, from, to);
            print_file_diffs(&source.files);
        }
    }
}

fn print_layer_moved(url: &str, dir: &Path, revision: &str, from: &str, to: &str) {
    println!(
        "Layer repository {url} checked out into {} updated revision {revision} from {from} to {to}",
        dir.display()
    );
}

/// Print one materialization event as it happens.
pub fn print_event(event: &Event) {
    match event {
        Event::SourceSynced {
            url,
            revision,
            layer_dir,
            outcome,
            baseline,
            files,
            ..
        } => match baseline {
            None => println!(
                "Layer repository {url} checked out into {} at revision {revision} ({})",
                layer_dir.display(),
                short(&outcome.current)
            ),
            Some(prev) if prev != &outcome.current => {
                print_layer_moved(url, layer_dir, revision, prev, &outcome.current);
                print_file_diffs(files);
            }
            Some(_) => {}
        },
        Event::BackupCreated {
            backend, backup, ..
        } => println!(
            "Existing {backend} configuration directory renamed to {}.",
            backup.display()
        ),
        Event::ConfDiff {
            configuration,
            diffs,
        } => {
            println!("Changes in the {configuration} build configuration:");
            print_file_diffs(diffs);
        }
        Event::ConfigurationMaterialized {
            configuration,
            build_dir,
        } => println!(
            "{} {configuration} set up in {}",
            "✓".green(),
            build_dir.display()
        ),
        Event::ConfigurationFailed {
            configuration,
            error,
        } => eprintln!("{} {configuration}: {error}", "✗".red()),
        Event::SnapshotWritten { path } => {
            tracing::debug!("snapshot written to {}", path.display())
        }
    }
}

fn print_file_diffs(diffs: &[FileDiff]) {
    for diff in diffs {
        print_text(&diff.unified_diff);
    }
}

fn print_text(text: &str) {
    print!("{text}");
    if !text.ends_with('\n') {
        println!();
    }
}

fn short(commit: &str) -> &str {
    commit.get(..12).unwrap_or(commit)
}
