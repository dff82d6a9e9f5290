//! End-to-end driver runs over a real build folder on disk.

use std::path::Path;

use symscan::cli::{self, Cli};
use tempfile::TempDir;

/// Lay out a small project: sources in `src/`, database in `build/`.
fn write_project(dir: &TempDir, main_source: &str, header_source: Option<&str>) -> (String, String) {
    let src = dir.path().join("src");
    let build = dir.path().join("build");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::create_dir_all(&build).unwrap();

    let main_path = src.join("main.cpp");
    std::fs::write(&main_path, main_source).unwrap();
    if let Some(header) = header_source {
        std::fs::write(src.join("lib.h"), header).unwrap();
    }

    let main_str = main_path.to_string_lossy().to_string();
    let database = format!(
        r#"[{{"directory": "{}", "file": "{}", "command": "c++ -c {}"}}]"#,
        build.to_string_lossy(),
        main_str,
        main_str
    );
    std::fs::write(build.join("compile_commands.json"), database).unwrap();

    (build.to_string_lossy().to_string(), main_str)
}

#[test]
fn test_run_produces_all_outputs() {
    let dir = TempDir::new().unwrap();
    let (build, main) = write_project(
        &dir,
        "#include \"lib.h\"\nvoid api() {}\nstatic int helper;\n",
        Some("void api();\n"),
    );

    let code = cli::run(&Cli {
        build_folder: build.into(),
        threads: 1,
    });
    assert_eq!(code, 0);

    let header = dir.path().join("src").join("lib.h");
    let header_str = header.to_string_lossy().to_string();

    let badsymbols = std::fs::read_to_string(format!("{}-badsymbols.txt", main)).unwrap();
    assert_eq!(
        badsymbols,
        format!("{}##3:12##helper##main_helper\n", main)
    );

    let implements = std::fs::read_to_string(format!("{}-implements.txt", main)).unwrap();
    assert_eq!(implements, format!("{}##{}##api\n", main, header_str));

    let forwards =
        std::fs::read_to_string(format!("{}-forwarddeclarations.txt", header_str)).unwrap();
    assert_eq!(forwards, format!("{}##1:1##1:12##api\n", header_str));

    let definitions = std::fs::read_to_string(format!("{}-definitions.txt", main)).unwrap();
    assert_eq!(definitions, format!("{}##2:1##2:14##api\n", main));
}

#[test]
fn test_run_with_multiple_threads() {
    let dir = TempDir::new().unwrap();
    let (build, main) = write_project(&dir, "static int only;\n", None);

    let code = cli::run(&Cli {
        build_folder: build.into(),
        threads: 4,
    });
    assert_eq!(code, 0);

    let badsymbols = std::fs::read_to_string(format!("{}-badsymbols.txt", main)).unwrap();
    assert_eq!(badsymbols, format!("{}##1:12##only##main_only\n", main));
}

#[test]
fn test_missing_build_folder_fails_with_environment_error() {
    let code = cli::run(&Cli {
        build_folder: "/no/such/build/folder".into(),
        threads: 1,
    });
    assert_eq!(code, cli::EXIT_ENVIRONMENT);
}

#[test]
fn test_build_folder_without_database_fails() {
    let dir = TempDir::new().unwrap();
    let code = cli::run(&Cli {
        build_folder: dir.path().to_path_buf(),
        threads: 1,
    });
    assert_eq!(code, cli::EXIT_ENVIRONMENT);
}

#[test]
fn test_front_end_failure_does_not_abort_the_run() {
    let dir = TempDir::new().unwrap();
    let build = dir.path().join("build");
    std::fs::create_dir_all(&build).unwrap();

    let good = dir.path().join("good.cpp");
    std::fs::write(&good, "static int fine;\n").unwrap();
    let good_str = good.to_string_lossy().to_string();
    let missing = dir.path().join("missing.cpp");
    let missing_str = missing.to_string_lossy().to_string();

    let database = format!(
        r#"[{{"directory": "{build}", "file": "{missing}", "command": "c++ -c {missing}"}},
            {{"directory": "{build}", "file": "{good}", "command": "c++ -c {good}"}}]"#,
        build = build.to_string_lossy(),
        missing = missing_str,
        good = good_str
    );
    std::fs::write(build.join("compile_commands.json"), database).unwrap();

    let code = cli::run(&Cli {
        build_folder: build.to_string_lossy().to_string().into(),
        threads: 1,
    });
    assert_eq!(code, 0);

    // The unreadable TU produced nothing, the good one everything.
    assert!(!Path::new(&format!("{}-badsymbols.txt", missing_str)).exists());
    let badsymbols = std::fs::read_to_string(format!("{}-badsymbols.txt", good_str)).unwrap();
    assert!(badsymbols.contains("##fine##good_fine"));
}
