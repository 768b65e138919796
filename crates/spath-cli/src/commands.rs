//! CLI command implementations.

use colored::Colorize;
use spath_core::SpathConfig;
use spath_index::SearchIndex;
use std::path::{Path, PathBuf};
use tracing::debug;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Write a default config file.
pub fn init(path: &Path) -> Result<()> {
    let config_path = SpathConfig::path_in(path);

    if spath_core::path::exists(&config_path) {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    SpathConfig::default().save(&config_path)?;

    println!("{} Initialized spath in {}", "✓".green(), path.display());
    println!("  Edit {} to list your search roots", config_path.display().to_string().cyan());

    Ok(())
}

/// Resolve one name.
pub fn search(
    config: Option<&Path>,
    name: &str,
    roots: Vec<PathBuf>,
    index_files: Vec<String>,
    cache: bool,
    json_output: bool,
) -> Result<()> {
    let settings = load_config(config)?;
    let cache = cache || settings.cache;
    let index_files = if index_files.is_empty() {
        settings.index_files.clone()
    } else {
        index_files
    };

    let index = open_index(pick_roots(roots, &settings), cache)?;
    let index_files: Vec<&str> = index_files.iter().map(String::as_str).collect();
    let hit = index.search(name, &index_files);

    if json_output {
        let value = match &hit {
            Some(hit) => serde_json::json!({
                "name": name,
                "path": hit.path,
                "isDir": hit.is_dir,
            }),
            None => serde_json::json!({ "name": name, "path": null }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match hit {
        Some(hit) => {
            let kind = if hit.is_dir { "dir " } else { "file" };
            println!("{} {}", kind.yellow(), hit.path.display().to_string().cyan());
            Ok(())
        }
        None => Err(format!("\"{}\" not found in any search directory", name).into()),
    }
}

/// Print every cached name.
pub fn list(config: Option<&Path>, roots: Vec<PathBuf>) -> Result<()> {
    let settings = load_config(config)?;
    let index = open_index(pick_roots(roots, &settings), true)?;

    for name in index.all_paths() {
        if let Some(hit) = index.search(&name, &[]) {
            let name = if hit.is_dir {
                format!("{}/", name.trim_end_matches('/')).blue().to_string()
            } else {
                name
            };
            println!("{}  {}", name, hit.path.display().to_string().dimmed());
        }
    }

    Ok(())
}

/// Show the resolved search directories.
pub fn status(config: Option<&Path>, roots: Vec<PathBuf>) -> Result<()> {
    let settings = load_config(config)?;
    let index = open_index(pick_roots(roots, &settings), true)?;

    println!("{}", "Search directories (highest priority first):".cyan());
    for (i, dir) in index.paths().iter().enumerate() {
        println!("  {}. {}", i + 1, dir.display());
    }
    println!(
        "{} {} names cached from {} directories",
        "✓".green(),
        index.all_paths().len().to_string().cyan(),
        index.size()
    );
    if !settings.index_files.is_empty() {
        println!("  Index files: {}", settings.index_files.join(", ").dimmed());
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SpathConfig> {
    let config = match path {
        Some(path) => SpathConfig::load(path)?,
        None => SpathConfig::load_or_default(&std::env::current_dir()?)?,
    };
    debug!("Using config {:?}", config);
    Ok(config)
}

fn pick_roots(flags: Vec<PathBuf>, settings: &SpathConfig) -> Vec<PathBuf> {
    if flags.is_empty() {
        settings.roots.clone()
    } else {
        flags
    }
}

/// Build an index over `roots`, failing on the first root that can't be added.
fn open_index(roots: Vec<PathBuf>, cache: bool) -> Result<SearchIndex> {
    let index = SearchIndex::new("", cache);
    for root in roots {
        index.add(&root.to_string_lossy())?;
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_init_writes_default_config() {
        let dir = tempdir().unwrap();
        init(dir.path()).unwrap();

        let config = SpathConfig::load(&SpathConfig::path_in(dir.path())).unwrap();
        assert_eq!(config, SpathConfig::default());

        // Running it again keeps the existing file.
        init(dir.path()).unwrap();
    }

    #[test]
    fn test_flags_override_config_roots() {
        let settings = SpathConfig::default();
        assert_eq!(pick_roots(vec![], &settings), settings.roots);
        assert_eq!(
            pick_roots(vec![PathBuf::from("/srv")], &settings),
            vec![PathBuf::from("/srv")]
        );
    }

    #[test]
    fn test_open_index_keeps_root_order() {
        let d1 = tempdir().unwrap();
        let d2 = tempdir().unwrap();
        fs::write(d1.path().join("a.txt"), "1").unwrap();
        fs::write(d2.path().join("a.txt"), "2").unwrap();

        let index = open_index(vec![d1.path().into(), d2.path().into()], false).unwrap();
        assert_eq!(index.size(), 2);
        assert_eq!(
            index.search("a.txt", &[]).unwrap().path,
            d1.path().canonicalize().unwrap().join("a.txt")
        );
    }

    #[test]
    fn test_open_index_reports_missing_root() {
        let dir = tempdir().unwrap();
        let result = open_index(vec![dir.path().join("missing")], false);
        assert!(result.is_err());
    }
}
