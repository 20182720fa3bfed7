//! ActorFactory 核心实现
//!
//! 从 CaptureBlueprint spawn 车辆与两个传感器，管理生命周期。

use contracts::{
    ActorId, ActorRegistry, ActorRole, ActorTemplate, CaptureBlueprint, SensorKind, Transform,
};
use tracing::{error, info, instrument, warn};

use crate::client::CarlaClient;
use crate::error::{ActorFactoryError, Result};

/// Teardown 结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// 成功销毁
    pub destroyed: Vec<(ActorRole, ActorId)>,
    /// 已不存活，跳过
    pub skipped: Vec<(ActorRole, ActorId)>,
    /// 销毁失败（已记录日志）
    pub failed: Vec<(ActorRole, ActorId)>,
}

impl TeardownReport {
    /// 所有 actor 都已处理且无失败
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 单个 actor 的 teardown 结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DestroyOutcome {
    Destroyed,
    AlreadyGone,
    Failed,
}

/// Actor Factory
///
/// 负责 spawn 车辆和传感器，并提供 teardown 能力。
pub struct ActorFactory<C: CarlaClient> {
    client: C,
}

impl<C: CarlaClient> ActorFactory<C> {
    /// 创建新的 ActorFactory
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// 底层客户端
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Spawn 车辆并挂载 LiDAR 与相机
    ///
    /// 所有蓝图在任何 spawn 之前解析完毕。每创建一个 actor 立即登记到 `registry`，
    /// 失败时 `registry` 恰好包含已创建的 actors；回收由调用方的 `teardown` 负责，
    /// 这里不做回滚。
    #[instrument(
        name = "actor_factory_spawn_rig",
        skip(self, blueprint, registry),
        fields(vehicle = %blueprint.vehicle.blueprint)
    )]
    pub async fn spawn_rig(
        &self,
        blueprint: &CaptureBlueprint,
        registry: &mut ActorRegistry,
    ) -> Result<()> {
        let vehicle_template = self
            .resolve_vehicle_template(&blueprint.vehicle.blueprint)
            .await?;
        let lidar_template = self
            .resolve_sensor_template(&blueprint.lidar.blueprint, blueprint.lidar.attributes())
            .await?;
        let camera_template = self
            .resolve_sensor_template(&blueprint.camera.blueprint, blueprint.camera.attributes())
            .await?;

        let vehicle_id = self.spawn_vehicle_actor(&vehicle_template).await?;
        registry.register_vehicle(vehicle_id);

        let sensors = [
            (SensorKind::Lidar, lidar_template, blueprint.lidar.mount),
            (SensorKind::Camera, camera_template, blueprint.camera.mount),
        ];
        for (kind, template, mount) in sensors {
            let sensor_id = self
                .spawn_sensor_actor(kind, &template, mount, vehicle_id)
                .await?;
            registry.register_sensor(kind, sensor_id);
        }

        info!(actors = registry.len(), "capture rig spawned successfully");
        Ok(())
    }

    /// 销毁 registry 中的所有 actors：LiDAR、相机、车辆
    ///
    /// # 幂等性
    /// 每个 actor 在处理后从 registry 移除，重复调用不会重复 destroy。
    /// 已不存活的 actor 跳过；单个 actor 失败不影响其余 actor。
    #[instrument(
        name = "actor_factory_teardown",
        skip(self, registry),
        fields(actor_count = registry.len())
    )]
    pub async fn teardown(&self, registry: &mut ActorRegistry) -> TeardownReport {
        let mut report = TeardownReport::default();

        for (role, actor_id) in registry.teardown_order() {
            registry.release(role);
            match self.destroy_actor_guarded(role, actor_id).await {
                DestroyOutcome::Destroyed => report.destroyed.push((role, actor_id)),
                DestroyOutcome::AlreadyGone => report.skipped.push((role, actor_id)),
                DestroyOutcome::Failed => report.failed.push((role, actor_id)),
            }
        }

        info!(
            destroyed = report.destroyed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "teardown completed"
        );
        report
    }

    /// 车辆蓝图：filter 结果的第一个，且名称必须完全匹配
    async fn resolve_vehicle_template(&self, name: &str) -> Result<ActorTemplate> {
        let candidates = self.client.filter_blueprints(name).await?;
        match candidates.into_iter().next() {
            Some(template) if template.id == name => Ok(template),
            Some(template) => {
                warn!(requested = name, first = %template.id, "first catalog match differs");
                Err(ActorFactoryError::template_not_found(name))
            }
            None => Err(ActorFactoryError::template_not_found(name)),
        }
    }

    /// 传感器蓝图：精确查找，并在 spawn 之前设置属性
    async fn resolve_sensor_template(
        &self,
        name: &str,
        attributes: Vec<(&'static str, String)>,
    ) -> Result<ActorTemplate> {
        let mut template = self
            .client
            .find_blueprint(name)
            .await?
            .ok_or_else(|| ActorFactoryError::template_not_found(name))?;

        for (key, value) in attributes {
            template.set_attribute(key, value);
        }
        Ok(template)
    }

    #[instrument(
        name = "actor_factory_spawn_vehicle_actor",
        skip(self, template),
        fields(blueprint = %template.id)
    )]
    async fn spawn_vehicle_actor(&self, template: &ActorTemplate) -> Result<ActorId> {
        let spawn_point = self
            .client
            .spawn_points()
            .await?
            .into_iter()
            .next()
            .ok_or(ActorFactoryError::NoSpawnPoints)?;

        info!(point = ?spawn_point.location, "spawning vehicle at first spawn point");
        let actor_id = self
            .client
            .try_spawn_actor(template, spawn_point)
            .await?
            .ok_or_else(|| ActorFactoryError::SpawnPointOccupied {
                blueprint: template.id.clone(),
            })?;

        info!(actor_id, "vehicle spawned successfully");
        Ok(actor_id)
    }

    #[instrument(
        name = "actor_factory_spawn_sensor_actor",
        skip(self, template, mount),
        fields(sensor = %kind, blueprint = %template.id)
    )]
    async fn spawn_sensor_actor(
        &self,
        kind: SensorKind,
        template: &ActorTemplate,
        mount: Transform,
        vehicle_id: ActorId,
    ) -> Result<ActorId> {
        info!(attributes = ?template.attributes, "spawning sensor");

        self.client
            .spawn_attached(template, mount, vehicle_id)
            .await
            .map_err(|e| match e {
                ActorFactoryError::SensorSpawnFailed { .. } => e,
                other => ActorFactoryError::sensor_spawn(&template.id, vehicle_id, other.to_string()),
            })
            .inspect(|&actor_id| {
                info!(actor_id, "sensor spawned and attached successfully");
            })
    }

    /// 带存活检查的销毁（忽略错误，仅记录日志）
    #[instrument(
        name = "actor_factory_destroy_actor",
        skip(self),
        fields(role = %role, actor_id)
    )]
    async fn destroy_actor_guarded(&self, role: ActorRole, actor_id: ActorId) -> DestroyOutcome {
        match self.client.is_alive(actor_id).await {
            Ok(false) => {
                info!(actor_id, %role, "actor no longer alive, skipping destroy");
                return DestroyOutcome::AlreadyGone;
            }
            Ok(true) => {}
            Err(e) => {
                warn!(actor_id, %role, error = %e, "liveness check failed, destroying anyway");
            }
        }

        info!(actor_id, %role, "destroying actor");
        match self.client.destroy_actor(actor_id).await {
            Ok(()) => DestroyOutcome::Destroyed,
            Err(e) => {
                error!(actor_id, %role, error = %e, "failed to destroy actor");
                DestroyOutcome::Failed
            }
        }
    }
}
