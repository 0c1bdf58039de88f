mod common;

#[cfg(feature = "e2e")]
use common::{CommandOutput, TestContext};

#[test]
#[cfg(feature = "e2e")]
fn e2e_add_resolves_latest_and_installs() {
    let ctx = TestContext::new();
    ctx.write_config("[]");

    let output: CommandOutput = ctx
        .online_cmd()
        .args(["add", "junegunn/fzf", "--install"])
        .output()
        .expect("Failed to run kelp")
        .into();

    output.assert_success().assert_stdout_contains("Installed");
    assert!(ctx.bin_dir.join("fzf").is_file());
    assert_ne!(ctx.read_config()[0]["Release"], "latest");
}

#[test]
#[cfg(feature = "e2e")]
fn e2e_install_pinned_release() {
    let ctx = TestContext::new();
    ctx.write_config(r#"[{"Owner": "BurntSushi", "Repo": "ripgrep", "Release": "14.1.0", "Binary": "rg"}]"#);

    let output: CommandOutput = ctx
        .online_cmd()
        .args(["install", "ripgrep"])
        .output()
        .expect("Failed to run kelp")
        .into();

    output.assert_success();
    assert!(ctx.bin_dir.join("rg").is_file());

    let output: CommandOutput = ctx
        .online_cmd()
        .args(["update", "ripgrep", "--yes"])
        .output()
        .expect("Failed to run kelp")
        .into();
    output.assert_success();
}

#[test]
#[cfg(feature = "e2e")]
fn e2e_unknown_release_fails() {
    let ctx = TestContext::new();
    ctx.write_config(r#"[{"Owner": "junegunn", "Repo": "fzf", "Release": "no-such-tag-0"}]"#);

    let output: CommandOutput = ctx
        .online_cmd()
        .args(["install", "fzf"])
        .output()
        .expect("Failed to run kelp")
        .into();

    output.assert_failure().assert_stderr_contains("not found");
}
