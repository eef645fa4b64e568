use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use image::{Rgb, RgbImage};
use predicates::prelude::*;

macro_rules! cargo_run {
    ($($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin("faceval")?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

const METADATA: &str = r#"{
    "bbox": [0.0, 0.0, 8.0, 8.0],
    "landmarks": {"left_eye": [2.0, 4.0], "right_eye": [6.0, 4.0]}
}"#;

/// 两个身份、每个身份两个采集组的最小数据集
fn write_dataset(root: &Path) -> Result<()> {
    for identity in ["id_a", "id_b"] {
        for group in ["g1", "g2"] {
            let dir = root.join(identity).join(group);
            fs::create_dir_all(&dir)?;
            RgbImage::from_pixel(8, 8, Rgb([200, 120, 80])).save(dir.join("img.jpg"))?;
            fs::write(dir.join("img.json"), METADATA)?;
        }
    }
    Ok(())
}

/// 输出固定 4 维向量的假 embedding 命令
fn write_embed_script(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("embed.sh");
    fs::write(&path, "#!/bin/sh\necho '[1.0, 0.0, 0.0, 0.0]'\n")?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

#[test]
fn full_pipeline() -> Result<()> {
    let data_dir = tempfile::tempdir()?;
    let dataset = tempfile::tempdir()?;
    write_dataset(dataset.path())?;
    let script = write_embed_script(data_dir.path())?;

    cargo_run!(
        "-c", data_dir.path(), "build",
        "-d", dataset.path(), "--embed-cmd", &script, "--dim", "4"
    )
    .success()
    .stdout(predicate::str::contains("画廊构建完成: 2 个身份"));

    assert!(data_dir.path().join("gallery.npy").exists());
    assert!(data_dir.path().join("gallery_id_map.json").exists());

    cargo_run!(
        "-c", data_dir.path(), "identify",
        "-d", dataset.path(), "--embed-cmd", &script, "--dim", "4"
    )
    .success()
    .stdout(predicate::str::contains("Rank-1"));

    assert!(data_dir.path().join("occlusion_results.csv").exists());

    cargo_run!(
        "-c", data_dir.path(), "verify",
        "-d", dataset.path(), "--embed-cmd", &script, "--dim", "4"
    )
    .success()
    .stdout(predicate::str::contains("比对总数"));

    assert!(data_dir.path().join("verification_scores.csv").exists());

    // 常数 embedding 没有区分能力，AUC 恰好为 0.5
    cargo_run!("-c", data_dir.path(), "metrics")
        .success()
        .stdout(predicate::str::contains("ROC-AUC: 0.5").and(predicate::str::contains("TAR @ FAR")));

    Ok(())
}

#[test]
fn audit_copies_are_saved() -> Result<()> {
    let data_dir = tempfile::tempdir()?;
    let dataset = tempfile::tempdir()?;
    write_dataset(dataset.path())?;
    let script = write_embed_script(data_dir.path())?;
    let audit = data_dir.path().join("occluded");

    cargo_run!(
        "-c", data_dir.path(), "build",
        "-d", dataset.path(), "--embed-cmd", &script, "--dim", "4"
    )
    .success();

    cargo_run!(
        "-c", data_dir.path(), "identify",
        "-d", dataset.path(), "--embed-cmd", &script, "--dim", "4",
        "--save-occluded", &audit
    )
    .success();

    // 每个身份的第二个采集组是查询样本
    assert!(audit.join("occluded_id_a_img.jpg").exists());
    assert!(audit.join("occluded_id_b_img.jpg").exists());
    Ok(())
}

#[test]
fn build_without_samples_fails() -> Result<()> {
    let data_dir = tempfile::tempdir()?;
    let dataset = tempfile::tempdir()?;

    cargo_run!(
        "-c", data_dir.path(), "build",
        "-d", dataset.path(), "--embed-cmd", "true", "--dim", "4"
    )
    .failure()
    .stderr(predicate::str::contains("没有找到任何带元数据的样本"));
    Ok(())
}

#[test]
fn identify_without_gallery_fails() -> Result<()> {
    let data_dir = tempfile::tempdir()?;
    let dataset = tempfile::tempdir()?;
    write_dataset(dataset.path())?;

    cargo_run!(
        "-c", data_dir.path(), "identify",
        "-d", dataset.path(), "--embed-cmd", "true", "--dim", "4"
    )
    .failure()
    .stderr(predicate::str::contains("画廊文件缺失"));
    Ok(())
}

#[test]
fn metrics_without_ledgers_fails() -> Result<()> {
    let data_dir = tempfile::tempdir()?;

    cargo_run!("-c", data_dir.path(), "metrics")
        .failure()
        .stderr(predicate::str::contains("没有找到任何评估结果清单"));
    Ok(())
}
