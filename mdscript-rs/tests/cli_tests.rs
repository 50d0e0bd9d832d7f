//! Run the `mdscript` binary on small documents and check what it prints.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mdscript"))
}

/// Run with an isolated config directory so a user's own config file
/// cannot leak into the test.
fn mdscript(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(binary());
    cmd.args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("xdg"))
        .env_remove("RUST_LOG");
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    mdscript(dir, args).output().expect("failed to spawn mdscript")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn write(dir: &Path, name: &str, text: &str) {
    std::fs::write(dir.join(name), text).expect("write fixture");
}

// ── run ───────────────────────────────────────────────────────────────────────

#[test]
fn runs_markdown_document() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "doc.md",
        "# Ignored heading\n\n\
         ```markdown-script\n\
         documentSetTitle('Keys')\n\
         for item in objectKeys(objectNew('A', 1, 'B', 2)):\n\
         \x20   markdownPrint('- ' + item)\n\
         endfor\n\
         ```\n\n\
         ```js\nnot script\n```\n",
    );
    let out = run(dir.path(), &["run", "doc.md"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "# Keys\n\n- A\n- B\n");
}

#[test]
fn no_title_flag() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "t.mds", "documentSetTitle('T')\nmarkdownPrint('body')\n");
    let out = run(dir.path(), &["run", "--no-title", "t.mds"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "body\n");
}

#[test]
fn vars_from_command_line() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "v.mds", "markdownPrint('Hello, ' + name, n + 1)\n");
    let out = run(dir.path(), &["run", "--var", "name=Ann", "--var", "n=41", "v.mds"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "Hello, Ann\n42\n");
}

#[test]
fn reads_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = mdscript(dir.path(), &["run", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"markdownPrint(1 + 2 * 3)\n")
        .expect("write stdin");
    let out = child.wait_with_output().expect("wait");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "7\n");
}

#[test]
fn async_clipboard_write_to_file() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "clip.mds",
        "function copy(text): windowClipboardWrite(text) endfunction\n\
         function report(): copy('copied') endfunction\n\
         report()\nmarkdownPrint('done')\n",
    );
    let out = run(dir.path(), &["run", "--clipboard", "clip.txt", "clip.mds"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "done\n");
    let clip = std::fs::read_to_string(dir.path().join("clip.txt")).unwrap();
    assert_eq!(clip, "copied");
}

// ── errors ────────────────────────────────────────────────────────────────────

#[test]
fn runtime_error_keeps_earlier_output() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "e.mds", "markdownPrint('before')\nnosuch()\nmarkdownPrint('after')\n");
    let out = run(dir.path(), &["run", "e.mds"]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(stdout(&out), "before\n");
    assert!(stderr(&out).contains("nosuch"), "stderr: {}", stderr(&out));
}

#[test]
fn parse_error_reports_document_line() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "bad.md",
        "text\n\n```markdown-script\nif true:\n  function f(): endfunction\nendif\n```\n",
    );
    let out = run(dir.path(), &["run", "bad.md"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stdout(&out).is_empty());
    let err = stderr(&out);
    assert!(err.contains("bad.md: parse error at 5:"), "stderr: {err}");
}

#[test]
fn deeply_nested_input_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let src = format!("x = {}1{}\n", "(".repeat(3000), ")".repeat(3000));
    write(dir.path(), "deep.mds", &src);
    let out = run(dir.path(), &["run", "deep.mds"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("parse error at 1:"), "stderr: {}", stderr(&out));
}

#[test]
fn statement_limit_flag() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "loop.mds", "while true:\nendwhile\n");
    let out = run(dir.path(), &["run", "--max-statements", "100", "loop.mds"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("100"), "stderr: {}", stderr(&out));
}

#[test]
fn missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &["run", "absent.md"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("reading absent.md"));
}

// ── config ────────────────────────────────────────────────────────────────────

#[test]
fn explicit_config_file() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "my.conf",
        "# test config\nvar.who = config\nmax_statements = 50\nbogus = 1\n",
    );
    write(dir.path(), "c.mds", "markdownPrint(who)\n");
    let out = run(dir.path(), &["--config", "my.conf", "run", "c.mds"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "config\n");
    assert!(stderr(&out).contains("unknown setting 'bogus'"));

    // Command-line variables override config ones.
    let out = run(dir.path(), &["--config", "my.conf", "run", "--var", "who=cli", "c.mds"]);
    assert_eq!(stdout(&out), "cli\n");
}

#[test]
fn unreadable_explicit_config_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "c.mds", "markdownPrint(1)\n");
    let out = run(dir.path(), &["--config", "missing.conf", "run", "c.mds"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stdout(&out).is_empty());
}

// ── check ─────────────────────────────────────────────────────────────────────

#[test]
fn check_lists_async_flags() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.mds",
        "function g(): f() endfunction\n\
         function f(): windowClipboardWrite('x') endfunction\n\
         function h(): markdownPrint('x') endfunction\n\
         h()\n",
    );
    let out = run(dir.path(), &["check", "a.mds"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "<main>: sync\nf: async\ng: async\nh: sync\n");
}
