//! Ingestion 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 记录源操作失败
    #[error(transparent)]
    Source(#[from] ContractError),

    /// 下游（累加器输入）通道已关闭
    #[error("accumulator input closed after {fed} record(s)")]
    ChannelClosed {
        /// 已送出的记录数
        fed: usize,
    },
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
