//! Command implementations for the CLI tool.

use std::path::{Path, PathBuf};

use jarwright::MergeOptions;
use jarwright::transform::{TransformOptions, transform_archive, transform_dependency};

use crate::config::{ChainConfig, ConfigError};
use crate::exit_codes::{ExitCode, error_to_exit_code};
use crate::output::{TransformSummary, create_formatter};
use crate::progress::{ChainProgress, MergeProgress};
use crate::{DuplicateMode, OutputFormat};

/// Configuration for the merge command.
pub struct MergeConfig<'a> {
    pub primary: &'a Path,
    pub others: &'a [PathBuf],
    pub output: &'a Path,
    pub duplicates: DuplicateMode,
    pub exclude: &'a [String],
    pub default_excludes: bool,
    pub merge_services: bool,
    pub merge_plugin_cache: bool,
    pub format: OutputFormat,
    pub quiet: bool,
}

/// Configuration for the transform command.
pub struct TransformConfig<'a> {
    pub input: &'a Path,
    pub chain: &'a Path,
    pub output: Option<&'a Path>,
    pub dependency_dir: Option<&'a Path>,
    pub atomic: bool,
    pub format: OutputFormat,
    pub quiet: bool,
}

fn merge_options(config: &MergeConfig<'_>) -> jarwright::Result<MergeOptions> {
    let mut options = MergeOptions::new()
        .duplicate_policy(config.duplicates.into())
        .merge_services(config.merge_services)
        .merge_plugin_cache(config.merge_plugin_cache);
    if config.default_excludes {
        options = options.with_default_excludes()?;
    }
    for glob in config.exclude {
        options = options.exclude(glob)?;
    }
    Ok(options)
}

/// Merge command implementation
pub fn merge(config: &MergeConfig<'_>) -> ExitCode {
    let formatter = create_formatter(config.format);

    let options = match merge_options(config) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::BadArgs;
        }
    };

    let progress = MergeProgress::new(config.others.len() + 1, config.quiet);
    let result = match jarwright::merge_archives(config.primary, config.others, config.output, &options) {
        Ok(r) => r,
        Err(e) => {
            progress.finish_with_message("Failed");
            eprintln!("Error: {}", e);
            return error_to_exit_code(&e);
        }
    };
    progress.finish();

    print!(
        "{}",
        formatter.format_merge_result(config.output, &result, file_size(config.output))
    );
    ExitCode::Success
}

/// Transform command implementation
pub fn transform(config: &TransformConfig<'_>) -> ExitCode {
    let formatter = create_formatter(config.format);

    // Unit directories in the chain file are relative to the file itself
    let base = config
        .chain
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let chain = match ChainConfig::load(config.chain).and_then(|c| c.build(&base)) {
        Ok(chain) => chain,
        Err(ConfigError::Transformer(e)) => {
            eprintln!("Error in chain file {}: {}", config.chain.display(), e);
            return ExitCode::BadArgs;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::BadArgs;
        }
    };
    let steps: Vec<String> = chain.iter().map(|t| t.name().to_string()).collect();

    let progress = ChainProgress::new(chain.len(), config.quiet);
    let mut tracked = progress.track(chain);

    let result = match config.dependency_dir {
        Some(dir) => transform_dependency(config.input, dir, &mut tracked),
        None => {
            let mut options = TransformOptions::new().atomic(config.atomic);
            if let Some(output) = config.output {
                options = options.output(output);
            }
            transform_archive(config.input, &options, &mut tracked)
        }
    };

    let output = match result {
        Ok(path) => path,
        Err(e) => {
            progress.abandon("Failed");
            eprintln!("Error: {}", e);
            if let Some(entry) = e.entry_path() {
                eprintln!("  while processing entry {}", entry);
            }
            return error_to_exit_code(&e);
        }
    };
    progress.finish();

    print!(
        "{}",
        formatter.format_transform_result(&TransformSummary {
            input: config.input.to_path_buf(),
            output_size: file_size(&output),
            output,
            steps,
        })
    );
    ExitCode::Success
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
