use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const DEFAULT_BUNDLE_DIR: &str = "love2d.docset";
pub const DEFAULT_CONFIG_FILENAME: &str = "docsetgen.toml";
pub const INDEX_FILENAME: &str = "docSet.dsidx";
pub const STYLESHEET_FILENAME: &str = "main.css";

const INFO_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>CFBundleIdentifier</key>
	<string>love2d</string>
	<key>CFBundleName</key>
	<string>LÖVE</string>
	<key>DocSetPlatformFamily</key>
	<string>love2d</string>
	<key>isDashDocset</key>
	<true/>
	<key>dashIndexFilePath</key>
	<string>love.html</string>
</dict>
</plist>
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub bundle: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct BundlePaths {
    pub bundle_root: PathBuf,
    pub contents_dir: PathBuf,
    pub resources_dir: PathBuf,
    pub documents_dir: PathBuf,
    pub index_path: PathBuf,
    pub info_plist_path: PathBuf,
    pub stylesheet_path: PathBuf,
    pub config_path: PathBuf,
    pub bundle_source: ValueSource,
    pub config_source: ValueSource,
}

impl BundlePaths {
    /// Lays out the fixed docset structure below `bundle_root`.
    pub fn under(bundle_root: &Path, config_path: &Path) -> Self {
        let contents_dir = bundle_root.join("Contents");
        let resources_dir = contents_dir.join("Resources");
        let documents_dir = resources_dir.join("Documents");
        Self {
            bundle_root: bundle_root.to_path_buf(),
            info_plist_path: contents_dir.join("Info.plist"),
            index_path: resources_dir.join(INDEX_FILENAME),
            stylesheet_path: documents_dir.join(STYLESHEET_FILENAME),
            contents_dir,
            resources_dir,
            documents_dir,
            config_path: config_path.to_path_buf(),
            bundle_source: ValueSource::Default,
            config_source: ValueSource::Default,
        }
    }

    pub fn document_path(&self, filename: &str) -> PathBuf {
        self.documents_dir.join(filename)
    }

    pub fn diagnostics(&self) -> String {
        format!(
            "bundle_root={} ({})\ndocuments_dir={}\nindex_path={}\nconfig_path={} ({})",
            normalize_for_display(&self.bundle_root),
            self.bundle_source.as_str(),
            normalize_for_display(&self.documents_dir),
            normalize_for_display(&self.index_path),
            normalize_for_display(&self.config_path),
            self.config_source.as_str(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct BundleStatus {
    pub bundle_exists: bool,
    pub info_plist_exists: bool,
    pub index_exists: bool,
    pub stylesheet_exists: bool,
    pub html_files: usize,
    pub media_files: usize,
    pub warnings: Vec<String>,
}

pub fn resolve_paths(cwd: &Path, overrides: &PathOverrides) -> BundlePaths {
    resolve_paths_with_lookup(cwd, overrides, |key| env::var(key).ok())
}

fn resolve_paths_with_lookup<F>(cwd: &Path, overrides: &PathOverrides, lookup_env: F) -> BundlePaths
where
    F: Fn(&str) -> Option<String>,
{
    let (bundle_root, bundle_source) = resolve_one(
        cwd,
        overrides.bundle.as_deref(),
        lookup_env("DOCSETGEN_BUNDLE"),
        DEFAULT_BUNDLE_DIR,
    );
    let (config_path, config_source) = resolve_one(
        cwd,
        overrides.config.as_deref(),
        lookup_env("DOCSETGEN_CONFIG"),
        DEFAULT_CONFIG_FILENAME,
    );

    BundlePaths {
        bundle_source,
        config_source,
        ..BundlePaths::under(&bundle_root, &config_path)
    }
}

fn resolve_one(
    cwd: &Path,
    flag: Option<&Path>,
    env_value: Option<String>,
    default: &str,
) -> (PathBuf, ValueSource) {
    if let Some(path) = flag {
        return (absolutize(path, cwd), ValueSource::Flag);
    }
    if let Some(value) = env_value.filter(|value| !value.trim().is_empty()) {
        return (absolutize(Path::new(value.trim()), cwd), ValueSource::Env);
    }
    (cwd.join(default), ValueSource::Default)
}

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct InitReport {
    pub created_dirs: Vec<PathBuf>,
    pub wrote_info_plist: bool,
}

pub fn init_layout(paths: &BundlePaths, options: &InitOptions) -> Result<InitReport> {
    let mut created_dirs = Vec::new();
    for dir in [
        &paths.bundle_root,
        &paths.contents_dir,
        &paths.resources_dir,
        &paths.documents_dir,
    ] {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            created_dirs.push(dir.clone());
        }
    }

    let wrote_info_plist = write_text_file(&paths.info_plist_path, INFO_PLIST, options.force)?;

    Ok(InitReport {
        created_dirs,
        wrote_info_plist,
    })
}

pub fn inspect_bundle(paths: &BundlePaths) -> Result<BundleStatus> {
    let mut html_files = 0usize;
    let mut media_files = 0usize;
    if paths.documents_dir.exists() {
        let entries = fs::read_dir(&paths.documents_dir)
            .with_context(|| format!("failed to read {}", paths.documents_dir.display()))?;
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to read {}", paths.documents_dir.display()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match path.extension().and_then(|ext| ext.to_str()) {
                Some("html") => html_files += 1,
                Some("css") => {}
                _ => media_files += 1,
            }
        }
    }

    let status = BundleStatus {
        bundle_exists: paths.bundle_root.exists(),
        info_plist_exists: paths.info_plist_path.exists(),
        index_exists: paths.index_path.exists(),
        stylesheet_exists: paths.stylesheet_path.exists(),
        html_files,
        media_files,
        warnings: Vec::new(),
    };

    let mut warnings = Vec::new();
    if !status.info_plist_exists {
        warnings.push("Info.plist is missing; run `docsetgen init`".to_string());
    }
    if !status.index_exists {
        warnings.push("docSet.dsidx is missing; run `docsetgen build`".to_string());
    }

    Ok(BundleStatus { warnings, ..status })
}

pub fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn write_text_file(path: &Path, content: &str, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }

    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create parent directory {}", parent.display()))?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}
