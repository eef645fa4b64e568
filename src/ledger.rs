use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;

use crate::eval::identify::QueryRecord;
use crate::eval::verify::VerificationPair;

const IDENTIFICATION_HEADER: &str = "query_identity,top1_identity,top1_score,\
                                     top2_identity,top2_score,top3_identity,top3_score,\
                                     is_correct_top1";
const VERIFICATION_HEADER: &str = "score,label";

/// 写出识别结果清单，每条查询一行
///
/// 固定三列 top 身份/分数，画廊不足三个身份时用 N/A 补齐。
pub fn write_identification(path: &Path, records: &[QueryRecord]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("创建识别结果清单失败: {}", path.display()))?;
    let mut w = BufWriter::new(file);

    writeln!(w, "{}", IDENTIFICATION_HEADER)?;
    for record in records {
        write!(w, "{}", record.identity)?;
        for i in 0..3 {
            match record.top.get(i) {
                Some((identity, score)) => write!(w, ",{},{:.4}", identity, score)?,
                None => write!(w, ",N/A,0.0000")?,
            }
        }
        writeln!(w, ",{}", record.correct_top1())?;
    }
    w.flush()?;
    Ok(())
}

/// 读回识别结果清单，损坏的行跳过并记录警告
pub fn read_identification(path: &Path) -> Result<Vec<QueryRecord>> {
    let file = File::open(path)
        .with_context(|| format!("打开识别结果清单失败: {}", path.display()))?;

    let mut records = Vec::new();
    for line in BufReader::new(file).lines().skip(1) {
        let line = line?;
        let fields = line.split(',').collect::<Vec<_>>();
        if fields.len() != 8 {
            warn!("跳过损坏的识别结果行: {}", line);
            continue;
        }
        let mut top = Vec::new();
        let mut valid = true;
        for i in 0..3 {
            let identity = fields[1 + i * 2];
            if identity == "N/A" {
                continue;
            }
            match fields[2 + i * 2].parse::<f32>() {
                Ok(score) => top.push((identity.to_string(), score)),
                Err(_) => {
                    valid = false;
                    break;
                }
            }
        }
        if !valid {
            warn!("跳过损坏的识别结果行: {}", line);
            continue;
        }
        records.push(QueryRecord { identity: fields[0].to_string(), top });
    }
    Ok(records)
}

/// 写出验证分数清单，每次比对一行
pub fn write_verification(path: &Path, pairs: &[VerificationPair]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("创建验证分数清单失败: {}", path.display()))?;
    let mut w = BufWriter::new(file);

    writeln!(w, "{}", VERIFICATION_HEADER)?;
    for pair in pairs {
        let label = if pair.genuine { "genuine" } else { "imposter" };
        writeln!(w, "{:.6},{}", pair.score, label)?;
    }
    w.flush()?;
    Ok(())
}

/// 读回验证分数清单，损坏的行跳过并记录警告
pub fn read_verification(path: &Path) -> Result<Vec<VerificationPair>> {
    let file = File::open(path)
        .with_context(|| format!("打开验证分数清单失败: {}", path.display()))?;

    let mut pairs = Vec::new();
    for line in BufReader::new(file).lines().skip(1) {
        let line = line?;
        let Some((score, label)) = line.split_once(',') else {
            warn!("跳过损坏的验证分数行: {}", line);
            continue;
        };
        let genuine = match label {
            "genuine" => true,
            "imposter" => false,
            _ => {
                warn!("跳过损坏的验证分数行: {}", line);
                continue;
            }
        };
        match score.parse::<f32>() {
            Ok(score) => pairs.push(VerificationPair { score, genuine }),
            Err(_) => warn!("跳过损坏的验证分数行: {}", line),
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_identification_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("occlusion_results.csv");

        let records = vec![
            QueryRecord {
                identity: "id_1".to_string(),
                top: vec![
                    ("id_1".to_string(), 0.9876),
                    ("id_2".to_string(), 0.5),
                    ("id_3".to_string(), 0.25),
                ],
            },
            QueryRecord {
                identity: "id_2".to_string(),
                top: vec![("id_1".to_string(), 0.5)],
            },
        ];
        write_identification(&path, &records).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("query_identity,top1_identity,top1_score,"));
        // 画廊不足三个身份时补 N/A
        assert!(content.contains("id_2,id_1,0.5000,N/A,0.0000,N/A,0.0000,false"));

        let loaded = read_identification(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].identity, "id_1");
        assert_eq!(loaded[0].top.len(), 3);
        assert!(loaded[0].correct_top1());
        assert_eq!(loaded[1].top.len(), 1);
        assert!(!loaded[1].correct_top1());
    }

    #[test]
    fn test_identification_skips_malformed_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("occlusion_results.csv");
        fs::write(
            &path,
            "query_identity,top1_identity,top1_score,top2_identity,top2_score,top3_identity,top3_score,is_correct_top1\n\
             id_1,id_1,0.9,id_2,0.5,id_3,0.2,true\n\
             broken-row\n\
             id_2,id_1,not-a-number,id_2,0.5,id_3,0.2,false\n",
        )
        .unwrap();

        let loaded = read_identification(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].identity, "id_1");
    }

    #[test]
    fn test_verification_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("verification_scores.csv");

        let pairs = vec![
            VerificationPair { score: 0.912345, genuine: true },
            VerificationPair { score: 0.1, genuine: false },
        ];
        write_verification(&path, &pairs).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("score,label\n"));
        assert!(content.contains("0.912345,genuine"));
        assert!(content.contains("0.100000,imposter"));

        let loaded = read_verification(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded[0].genuine);
        assert!(!loaded[1].genuine);
    }

    #[test]
    fn test_verification_skips_malformed_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("verification_scores.csv");
        fs::write(&path, "score,label\n0.5,genuine\nnot-a-score,imposter\n0.4,unknown\n")
            .unwrap();

        let loaded = read_verification(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!((loaded[0].score - 0.5).abs() < 1e-6);
    }
}
