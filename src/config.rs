use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;

static DATA_DIR: LazyLock<DataDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "", "faceval").expect("failed to get project dir");
    DataDir { path: proj_dirs.data_dir().to_path_buf() }
});

fn default_data_dir() -> &'static str {
    DATA_DIR.path().to_str().unwrap()
}

#[derive(Parser, Debug, Clone)]
#[command(name = "faceval", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// faceval 数据目录，存放画廊索引与评估结果清单
    #[arg(short = 'c', long, default_value = default_data_dir())]
    pub data_dir: DataDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 从注册样本构建身份画廊
    Build(BuildCommand),
    /// 对遮挡后的查询样本执行 1:N 识别评估
    Identify(IdentifyCommand),
    /// 对遮挡后的查询样本执行 1:1 验证评估
    Verify(VerifyCommand),
    /// 根据已有的评估结果清单计算指标
    Metrics(MetricsCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct DatasetOptions {
    /// 数据集根目录，结构为 <root>/<身份>/<采集组>/<图片>
    /// 每张图片需要有同名 .json 检测元数据文件
    #[arg(short, long, value_name = "DIR", verbatim_doc_comment)]
    pub dataset: PathBuf,
    /// 扫描的图片后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,png")]
    pub suffix: String,
    /// 注册集比例，每个身份的采集组按此比例划分为注册/查询两半
    #[arg(long, value_name = "RATIO", default_value_t = 0.5)]
    pub split_ratio: f32,
}

#[derive(Parser, Debug, Clone)]
pub struct EmbedOptions {
    /// 外部 embedding 命令，接收图片路径作为最后一个参数，
    /// 并向 stdout 输出一个 JSON 浮点数组
    #[arg(long, value_name = "CMD", verbatim_doc_comment)]
    pub embed_cmd: String,
    /// embedding 向量维度
    #[arg(long, value_name = "DIM", default_value_t = 512)]
    pub dim: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct EvalOptions {
    /// 遮挡条带的总高度（像素），以双眼中心为中线上下平分
    #[arg(long, value_name = "PX", default_value_t = 30)]
    pub occlusion_size: u32,
    /// 工作线程数量，默认为 CPU 核心数
    #[arg(short = 'j', long, value_name = "N")]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct DataDir {
    path: PathBuf,
}

impl DataDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回画廊向量存储文件的路径
    pub fn gallery_vectors(&self) -> PathBuf {
        self.path.join("gallery.npy")
    }

    /// 返回画廊序号到身份映射文件的路径
    pub fn gallery_mapping(&self) -> PathBuf {
        self.path.join("gallery_id_map.json")
    }

    /// 返回识别结果清单的路径
    pub fn identification_ledger(&self) -> PathBuf {
        self.path.join("occlusion_results.csv")
    }

    /// 返回验证分数清单的路径
    pub fn verification_ledger(&self) -> PathBuf {
        self.path.join("verification_scores.csv")
    }
}

impl FromStr for DataDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
