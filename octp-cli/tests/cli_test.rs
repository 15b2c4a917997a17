//! Drives the built `octp` binary end to end

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn octp(args: &[&str], cwd: &Path) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_octp"))
        .args(args)
        .current_dir(cwd)
        .env_remove("OCTP_KEYS_DIR")
        .output()?)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../octp-core/tests/fixtures/foreign_envelope.json")
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A repository with one commit and an origin remote
fn init_repo() -> Result<TempDir> {
    let dir = TempDir::new()?;
    let git = |args: &[&str]| -> Result<()> {
        let status = Command::new("git")
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(["-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(dir.path())
            .output()?
            .status;
        anyhow::ensure!(status.success(), "git {:?} failed", args);
        Ok(())
    };

    git(&["init", "-q"])?;
    fs::write(dir.path().join("app.py"), "print('hello')\n")?;
    git(&["add", "app.py"])?;
    git(&["commit", "-q", "-m", "initial"])?;
    git(&["remote", "add", "origin", "git@github.com:acme/widgets.git"])?;
    Ok(dir)
}

#[test]
fn test_verify_accepts_untouched_envelope() -> Result<()> {
    let tmp = TempDir::new()?;
    let output = octp(&["verify", fixture().to_str().unwrap_or_default()], tmp.path())?;

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("Payload hash:  MATCH"));
    assert!(text.contains("Signature:     not checked"));
    assert!(text.contains("Only payload integrity was verified"));
    Ok(())
}

#[test]
fn test_verify_rejects_tampered_envelope() -> Result<()> {
    let tmp = TempDir::new()?;
    let mut document: serde_json::Value = serde_json::from_str(&fs::read_to_string(fixture())?)?;
    document["repository"] = serde_json::json!("github.com/evil/widgets");
    let tampered = tmp.path().join("tampered.json");
    fs::write(&tampered, serde_json::to_string_pretty(&document)?)?;

    let output = octp(&["verify", "tampered.json"], tmp.path())?;

    assert!(!output.status.success());
    assert!(stdout(&output).contains("MISMATCH"));
    assert!(stderr(&output).contains("failed verification"));
    Ok(())
}

#[test]
fn test_verify_json_report() -> Result<()> {
    let tmp = TempDir::new()?;
    let output = octp(
        &["verify", "--json", fixture().to_str().unwrap_or_default()],
        tmp.path(),
    )?;

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["valid"], true);
    assert_eq!(report["payload"], "match");
    assert_eq!(report["signature"], "not_checked");
    Ok(())
}

#[test]
fn test_verify_with_unrelated_key_fails() -> Result<()> {
    let tmp = TempDir::new()?;
    let keys_dir = tmp.path().join("keys");
    let keys = octp(&["keys", "--keys-dir", keys_dir.to_str().unwrap_or_default()], tmp.path())?;
    assert!(keys.status.success());

    let output = octp(
        &[
            "verify",
            fixture().to_str().unwrap_or_default(),
            "--public-key",
            keys_dir.join("public.pem").to_str().unwrap_or_default(),
        ],
        tmp.path(),
    )?;

    assert!(!output.status.success());
    assert!(stdout(&output).contains("Signature:     INVALID"));
    Ok(())
}

#[test]
fn test_keys_creates_and_reuses_keypair() -> Result<()> {
    let tmp = TempDir::new()?;
    let keys_dir = tmp.path().join("keys");
    let dir_arg = keys_dir.to_str().unwrap_or_default();

    let first = octp(&["keys", "--keys-dir", dir_arg], tmp.path())?;
    assert!(first.status.success(), "stderr: {}", stderr(&first));
    assert!(stdout(&first).contains("Generated a new signing keypair."));
    assert!(stdout(&first).contains("-----BEGIN PUBLIC KEY-----"));
    assert!(keys_dir.join("private.pem").is_file());
    assert!(keys_dir.join("public.pem").is_file());

    let second = octp(&["keys", "--keys-dir", dir_arg], tmp.path())?;
    assert!(second.status.success());
    assert!(!stdout(&second).contains("Generated"));

    let pem = |out: &Output| {
        stdout(out)
            .split("-----BEGIN PUBLIC KEY-----")
            .nth(1)
            .map(str::to_string)
    };
    assert_eq!(pem(&first), pem(&second));
    Ok(())
}

#[test]
fn test_sign_then_verify_with_local_key() -> Result<()> {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return Ok(());
    }
    let repo = init_repo()?;
    let keys_dir = repo.path().join(".keys");
    let dir_arg = keys_dir.to_str().unwrap_or_default();

    // detect-secrets may be missing here; the envelope is written either way
    let sign = octp(
        &[
            "sign",
            "--runners",
            "secret-scan",
            "--method",
            "ai_assisted_human_reviewed",
            "--review-level",
            "moderate",
            "--ai-tool",
            "gpt-4o:openai:2024-08-06:completion",
            "--confidence",
            "high",
            "--keys-dir",
            dir_arg,
        ],
        repo.path(),
    )?;
    assert!(sign.status.success(), "stderr: {}", stderr(&sign));
    assert!(stdout(&sign).contains("Envelope written to"));

    let envelope_path = repo.path().join("octp-envelope.json");
    let envelope: serde_json::Value = serde_json::from_str(&fs::read_to_string(&envelope_path)?)?;
    assert_eq!(envelope["repository"], "github.com/acme/widgets");
    assert_eq!(envelope["provenance"]["method"], "ai_assisted_human_reviewed");
    assert_eq!(envelope["provenance"]["human_review_level"], "moderate_review");
    assert_eq!(envelope["provenance"]["ai_tools"][0]["vendor"], "openai");
    assert_eq!(envelope["optional_context"]["self_assessed_confidence"], "high");
    assert_eq!(envelope["integrity"]["signature_algorithm"], "ES256");
    assert_eq!(envelope["verification"]["tests_passed"], false);

    let verify = octp(
        &[
            "verify",
            "octp-envelope.json",
            "--local-key",
            "--keys-dir",
            dir_arg,
        ],
        repo.path(),
    )?;
    assert!(verify.status.success(), "stdout: {}", stdout(&verify));
    assert!(stdout(&verify).contains("Signature:     VALID"));
    Ok(())
}

#[test]
fn test_sign_rejects_unknown_profile() -> Result<()> {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return Ok(());
    }
    let repo = init_repo()?;
    let keys_dir = repo.path().join(".keys");

    let output = octp(
        &[
            "sign",
            "--profile",
            "bogus",
            "--method",
            "human_only",
            "--review-level",
            "none",
            "--keys-dir",
            keys_dir.to_str().unwrap_or_default(),
        ],
        repo.path(),
    )?;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Unknown profile: bogus. Available: full, fast, ci, security"));
    assert!(!repo.path().join("octp-envelope.json").exists());
    Ok(())
}

#[test]
fn test_sign_outside_repository_fails() -> Result<()> {
    let tmp = TempDir::new()?;
    let output = octp(
        &[
            "sign",
            "--method",
            "human_only",
            "--review-level",
            "none",
            "--keys-dir",
            tmp.path().join("keys").to_str().unwrap_or_default(),
        ],
        tmp.path(),
    )?;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to read repository"));
    Ok(())
}

#[test]
fn test_sign_requires_a_declaration() -> Result<()> {
    let tmp = TempDir::new()?;
    let output = octp(&["sign", "--method", "human_only"], tmp.path())?;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("--review-level"));
    Ok(())
}

#[test]
fn test_tracing_stays_off_stdout() -> Result<()> {
    let tmp = TempDir::new()?;
    let path = fixture();
    let output = octp(
        &[
            "--trace",
            "integrity,envelope",
            "--log-level",
            "debug",
            "verify",
            "--json",
            path.to_str().unwrap_or_default(),
        ],
        tmp.path(),
    )?;

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let report: serde_json::Value = serde_json::from_str(&stdout(&output))?;
    assert_eq!(report["payload"], "match");

    for line in stderr(&output).lines().filter(|l| !l.trim().is_empty()) {
        let event: serde_json::Value = serde_json::from_str(line)?;
        assert!(event.is_object(), "not a JSON event: {line}");
    }
    Ok(())
}

#[test]
fn test_unknown_log_level_rejected() -> Result<()> {
    let tmp = TempDir::new()?;
    let output = octp(&["--log-level", "loud", "keys"], tmp.path())?;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("loud"));
    Ok(())
}
