//! 运动规划：每轴速度合成
//!
//! 给定当前位置、目标位置和名义速度，按各轴位移比例分配速度，
//! 使多轴运动近似同时到达。
//!
//! ```text
//! diff[i]  = target[i] - current[i]
//! dist     = max(1, |diff|₂)
//! speed[i] = max(32, s · |diff[i]| / dist)
//! ```
//!
//! 下限 32 µm/s 对所有参与的轴生效（包括位移为 0 的轴）：
//! 硬件在更低的轴速度下会产生较大的位置跟踪误差。

use sensapex_transport::{DeviceId, MAX_AXES, Request};

/// 单轴速度下限（µm/s）
pub const MIN_AXIS_SPEED: f64 = 32.0;

/// 名义速度下限（µm/s），更低的值会被设备拒绝
pub const MIN_SPEED: f64 = 1.0;

/// 运动选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOptions {
    /// 等待运动完成后再返回
    pub block: bool,
    /// 所有轴同时启动（否则逐轴运动）
    pub simultaneous: bool,
    /// 保留选项，目前不改变规划结果
    pub linear: bool,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            block: false,
            simultaneous: true,
            linear: false,
        }
    }
}

impl MoveOptions {
    pub fn blocking(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    pub fn simultaneous(mut self, simultaneous: bool) -> Self {
        self.simultaneous = simultaneous;
        self
    }

    pub fn linear(mut self, linear: bool) -> Self {
        self.linear = linear;
        self
    }
}

/// 一次运动命令的完整参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionPlan {
    /// 目标位置（补零到 4 轴）
    pub target: [i32; MAX_AXES],
    /// 每轴速度（补零到 4 轴）
    pub speeds: [i32; MAX_AXES],
    /// 1 = 所有轴同时启动，0 = 逐轴
    pub mode: i32,
}

impl MotionPlan {
    /// 转换为传输层请求
    pub fn to_request(&self, dev: DeviceId) -> Request {
        Request::GotoPosition {
            dev,
            target: self.target,
            speeds: self.speeds,
            mode: self.mode,
        }
    }
}

/// 计算每轴速度
///
/// 只计算 `current` 与 `target` 都包含的轴，其余补 0。
pub fn axis_speeds(current: &[i32], target: &[i32], speed: f64) -> [i32; MAX_AXES] {
    let diff: Vec<f64> = target
        .iter()
        .zip(current)
        .take(MAX_AXES)
        .map(|(&p, &c)| f64::from(p) - f64::from(c))
        .collect();
    let dist = diff.iter().map(|d| d * d).sum::<f64>().sqrt().max(1.0);

    let mut speeds = [0; MAX_AXES];
    for (out, d) in speeds.iter_mut().zip(&diff) {
        *out = (speed * d.abs() / dist).max(MIN_AXIS_SPEED) as i32;
    }
    speeds
}

/// 生成运动命令参数
///
/// `speed` 低于 [`MIN_SPEED`] 时按下限处理；`options.linear` 不影响结果。
pub fn plan_move(current: &[i32], target: &[i32], speed: f64, options: MoveOptions) -> MotionPlan {
    let speed = speed.max(MIN_SPEED);

    let mut padded = [0; MAX_AXES];
    for (out, &p) in padded.iter_mut().zip(target) {
        *out = p;
    }

    MotionPlan {
        target: padded,
        speeds: axis_speeds(current, &padded, speed),
        mode: i32::from(options.simultaneous),
    }
}
