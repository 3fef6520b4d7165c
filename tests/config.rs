use shipyard::config::{ArtifactSpec, Config, PutConfig, Repo};
use shipyard::context::ArtifactKind;
use shipyard::init::{generate_config, starter_config};
use shipyard::publishers::default_registry;
use shipyard::validation::validate_config;
use tempfile::tempdir;

fn validate(config: &Config) -> shipyard::validation::ValidationReport {
    validate_config(config, &default_registry().unwrap())
}

#[test]
fn starter_config_is_valid() {
    let report = validate(&starter_config("tool"));
    assert!(report.is_ok(), "unexpected errors: {:?}", report.errors);
    assert!(report.warnings.is_empty());
}

#[test]
fn reports_every_problem() {
    let mut config = Config::default();
    config.git.short_hash = true;
    config.release.prerelease = "sometimes".into();
    config.snapshot.name_template = "SNAPSHOT-{{ .ShortCommit".into();
    config.scoop.bucket = Repo {
        owner: String::new(),
        name: "bucket".into(),
    };
    config.artifacts = vec![ArtifactSpec {
        path: "dist/[".into(),
        kind: ArtifactKind::Archive,
        goos: None,
        goarch: None,
    }];
    config.puts = vec![PutConfig {
        name: "staging".into(),
        mode: "tarball".into(),
        ..PutConfig::default()
    }];

    let report = validate(&config);
    assert!(!report.is_ok());
    let errors = report.errors.join("\n");
    assert!(errors.contains("release.prerelease"));
    assert!(errors.contains("snapshot.name_template"));
    assert!(errors.contains("scoop.bucket.owner"));
    assert!(errors.contains("is not a valid glob"));
    assert!(errors.contains("puts[0] ('staging'): target must be set"));
    assert!(errors.contains("puts[0] ('staging'): username must be set"));
    assert!(errors.contains("mode must be 'binary' or 'archive', got 'tarball'"));

    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings.iter().any(|w| w.contains("git.short_hash")));
    assert!(report.warnings.iter().any(|w| w.contains("project_name")));
}

#[test]
fn generated_config_loads_back() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("conf").join(".shipyard.yml");
    let written = generate_config("tool", &path, false).unwrap();
    assert_eq!(written, path);

    let config = Config::load(&path).unwrap();
    assert_eq!(config.project_name, "tool");
    assert_eq!(config.release.prerelease, "auto");
    assert_eq!(config.artifacts.len(), 3);
    assert_eq!(config.artifacts[1].goos.as_deref(), Some("windows"));
    assert_eq!(config.puts[0].name, "production");
    assert!(validate(&config).is_ok());
}

#[test]
fn generate_refuses_to_overwrite() {
    let temp = tempdir().unwrap();
    let path = temp.path().join(".shipyard.yml");
    std::fs::write(&path, "project_name: keep\n").unwrap();

    let err = generate_config("tool", &path, false).unwrap_err();
    assert!(err.to_string().contains("--force"));
    assert_eq!(Config::load(&path).unwrap().project_name, "keep");

    generate_config("tool", &path, true).unwrap();
    assert_eq!(Config::load(&path).unwrap().project_name, "tool");
}

#[test]
fn invalid_yaml_names_the_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("broken.yml");
    std::fs::write(&path, "release: [unterminated").unwrap();
    let err = Config::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("broken.yml"));
}
