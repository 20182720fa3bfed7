//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (derive `Validate`)
//! - 蓝图名称前缀与传感器类型匹配
//! - 相机挂载在激光雷达前方且不高于激光雷达

use contracts::{CaptureBlueprint, ContractError};
use validator::Validate;

/// 校验 CaptureBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    validate_ranges(blueprint)?;
    validate_blueprint_names(blueprint)?;
    validate_mounts(blueprint)?;
    Ok(())
}

/// 字段范围校验
fn validate_ranges(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    // NaN 会通过 range 校验（比较恒为 false），先单独拒绝
    validate_finite(blueprint)?;
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))
}

/// 所有浮点字段必须是有限值
fn validate_finite(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let lidar = &blueprint.lidar;
    let camera = &blueprint.camera;
    let mut fields = vec![
        ("carla.timeout_sec", blueprint.carla.timeout_sec),
        ("lidar.rotation_frequency", lidar.rotation_frequency),
        ("camera.fov", camera.fov),
    ];
    fields.extend(lidar.upper_fov.map(|v| ("lidar.upper_fov", v)));
    fields.extend(lidar.lower_fov.map(|v| ("lidar.lower_fov", v)));
    for (name, mount) in [("lidar.mount", lidar.mount), ("camera.mount", camera.mount)] {
        let l = mount.location;
        let r = mount.rotation;
        for value in [l.x, l.y, l.z, r.pitch, r.yaw, r.roll] {
            fields.push((name, value));
        }
    }

    match fields.into_iter().find(|(_, value)| !value.is_finite()) {
        Some((field, value)) => Err(ContractError::config_validation(
            field,
            format!("must be a finite number, got {value}"),
        )),
        None => Ok(()),
    }
}

/// 校验蓝图前缀
fn validate_blueprint_names(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let checks = [
        ("vehicle.blueprint", &blueprint.vehicle.blueprint, "vehicle."),
        ("lidar.blueprint", &blueprint.lidar.blueprint, "sensor.lidar."),
        ("camera.blueprint", &blueprint.camera.blueprint, "sensor.camera."),
    ];

    for (field, name, prefix) in checks {
        if !name.starts_with(prefix) {
            return Err(ContractError::config_validation(
                field,
                format!("blueprint '{name}' must start with '{prefix}'"),
            ));
        }
    }
    Ok(())
}

/// 校验挂载位置：激光雷达在车顶，相机在其前下方
fn validate_mounts(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let lidar = blueprint.lidar.mount.location;
    let camera = blueprint.camera.mount.location;

    if lidar.z <= 0.0 {
        return Err(ContractError::config_validation(
            "lidar.mount.location.z",
            format!("scanner must sit above the vehicle origin, got z={}", lidar.z),
        ));
    }

    if camera.z > lidar.z {
        return Err(ContractError::config_validation(
            "camera.mount.location.z",
            format!(
                "camera (z={}) must not be mounted above the scanner (z={})",
                camera.z, lidar.z
            ),
        ));
    }

    if camera.x < lidar.x {
        return Err(ContractError::config_validation(
            "camera.mount.location.x",
            format!(
                "camera (x={}) must be mounted forward of the scanner (x={})",
                camera.x, lidar.x
            ),
        ));
    }

    Ok(())
}
