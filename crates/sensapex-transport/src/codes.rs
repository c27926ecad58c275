//! 传输层错误码
//!
//! 与底层协议库保持逐位一致，不要修改数值。

/// 无错误
pub const NO_ERROR: i32 = 0;
/// OS 级错误，需要另外查询 errno
pub const OS_ERROR: i32 = -1;
/// 句柄未打开
pub const NOT_OPEN: i32 = -2;
/// 接收超时（没有待处理的包）
pub const TIMEOUT: i32 = -3;
/// 参数无效
pub const INVALID_ARG: i32 = -4;
/// 设备不存在
pub const INVALID_DEVICE: i32 = -5;
/// 设备无响应 / 响应无效（枚举时同样视为不存在）
pub const INVALID_RESPONSE: i32 = -6;

/// 扩展特性：自定义慢速模式
pub const FEATURE_CUSTOM_SLOW_SPEED: i32 = 32;

/// 错误码是否表示“设备不存在”
pub const fn is_device_missing(code: i32) -> bool {
    matches!(code, INVALID_DEVICE | INVALID_RESPONSE)
}

/// 错误码的默认描述
pub fn describe(code: i32) -> &'static str {
    match code {
        NO_ERROR => "No error",
        OS_ERROR => "Operating system level error",
        NOT_OPEN => "Not opened",
        TIMEOUT => "Timeout",
        INVALID_ARG => "Invalid argument",
        INVALID_DEVICE => "Invalid device id",
        INVALID_RESPONSE => "Invalid response",
        _ => "Unknown error",
    }
}
