//! Mock CARLA 客户端
//!
//! 进程内模拟器：自走帧时钟、按传感器独立的投递线程、可注入失败场景，
//! 并记录调用顺序 (`SimCall`) 供测试断言。

use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    ActorId, ActorTemplate, ImageData, PointCloudData, SensorKind, SensorPacket, SensorPayload,
    SensorSource, Transform,
};
use tracing::{debug, instrument};

use crate::client::CarlaClient;
use crate::error::{ActorFactoryError, Result};
use crate::mock_sensor::MockSensor;

/// Mock 客户端配置
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// 模拟服务器无响应（connect 超时）
    pub unreachable: bool,
    /// 蓝图目录
    pub catalog: Vec<String>,
    /// 地图出生点
    pub spawn_points: Vec<Transform>,
    /// 出生点被占用：非致命 spawn 总是返回 None
    pub spawn_point_occupied: bool,
    /// attach 失败的蓝图 IDs
    pub fail_attach: Vec<String>,
    /// destroy 失败的蓝图 IDs
    pub fail_destroy: Vec<String>,
    /// 初始帧号
    pub start_frame: u64,
    /// 帧时钟周期；None 表示手动推进 (`advance`)
    pub tick_interval: Option<Duration>,
    /// 每帧 LiDAR 点数
    pub lidar_points_per_frame: u32,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            unreachable: false,
            catalog: vec![
                "vehicle.tesla.model3".to_string(),
                "vehicle.tesla.cybertruck".to_string(),
                "vehicle.audi.tt".to_string(),
                "sensor.lidar.ray_cast".to_string(),
                "sensor.camera.rgb".to_string(),
            ],
            spawn_points: vec![Transform::at(10.0, 20.0, 0.5)],
            spawn_point_occupied: false,
            fail_attach: vec![],
            fail_destroy: vec![],
            start_frame: 1000,
            tick_interval: Some(Duration::from_millis(50)),
            lidar_points_per_frame: 1000,
        }
    }
}

/// 记录的模拟器调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    Connect,
    SpawnVehicle {
        actor_id: ActorId,
        blueprint: String,
    },
    SpawnSensor {
        actor_id: ActorId,
        parent_id: ActorId,
        blueprint: String,
    },
    Listen(ActorId),
    Stop(ActorId),
    SetAutopilot(ActorId, bool),
    Destroy(ActorId),
}

/// 帧时钟
#[derive(Debug)]
struct FrameClock {
    frame: AtomicU64,
    running: AtomicBool,
}

#[derive(Debug, Clone, Copy)]
enum MockActorKind {
    Vehicle { autopilot: bool },
    Sensor { kind: SensorKind, parent: ActorId },
}

/// 模拟 actor
#[derive(Debug)]
pub(crate) struct MockActor {
    blueprint: String,
    attributes: HashMap<String, String>,
    kind: MockActorKind,
    alive: bool,
    /// 同一 actor 的所有 SensorSource 共享监听状态，保证只注册一个回调
    pub(crate) listening: Arc<AtomicBool>,
    pub(crate) delivery: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// 模拟世界（共享状态）
#[derive(Debug)]
pub(crate) struct MockWorld {
    config: MockConfig,
    connected: AtomicBool,
    clock: Arc<FrameClock>,
    next_actor_id: AtomicU32,
    actors: Mutex<HashMap<ActorId, MockActor>>,
    calls: Mutex<Vec<SimCall>>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockWorld {
    fn new(config: MockConfig) -> Self {
        let clock = Arc::new(FrameClock {
            frame: AtomicU64::new(config.start_frame),
            running: AtomicBool::new(false),
        });
        Self {
            config,
            connected: AtomicBool::new(false),
            clock,
            next_actor_id: AtomicU32::new(1000), // 从 1000 开始，便于识别
            actors: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn record(&self, call: SimCall) {
        lock(&self.calls).push(call);
    }

    pub(crate) fn frame(&self) -> u64 {
        self.clock.frame.load(Ordering::Acquire)
    }

    /// 启动自走时钟（仅一次）
    fn start_clock(&self) {
        let Some(interval) = self.config.tick_interval else {
            return;
        };
        if self.clock.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let clock = Arc::clone(&self.clock);
        let spawned = thread::Builder::new()
            .name("mock-frame-clock".into())
            .spawn(move || {
                while clock.running.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    clock.frame.fetch_add(1, Ordering::AcqRel);
                }
            });
        if let Err(e) = spawned {
            self.clock.running.store(false, Ordering::SeqCst);
            tracing::warn!(error = %e, "failed to start mock frame clock");
        }
    }

    /// 监听句柄 (listening flag, delivery thread slot)
    pub(crate) fn listen_handles(
        &self,
        actor_id: ActorId,
    ) -> Option<(Arc<AtomicBool>, Arc<Mutex<Option<JoinHandle<()>>>>)> {
        lock(&self.actors)
            .get(&actor_id)
            .map(|actor| (Arc::clone(&actor.listening), Arc::clone(&actor.delivery)))
    }

    /// 生成指定帧的数据包；actor 不存活时返回 None
    pub(crate) fn packet_for(&self, actor_id: ActorId, frame: u64) -> Option<SensorPacket> {
        let actors = lock(&self.actors);
        let actor = actors.get(&actor_id).filter(|a| a.alive)?;
        let MockActorKind::Sensor { kind, .. } = actor.kind else {
            return None;
        };

        let payload = match kind {
            SensorKind::Lidar => lidar_payload(self.config.lidar_points_per_frame, frame),
            SensorKind::Camera => {
                let width = parse_attr(&actor.attributes, "image_size_x", 800);
                let height = parse_attr(&actor.attributes, "image_size_y", 600);
                camera_payload(width, height, frame)
            }
        };

        Some(SensorPacket {
            sensor_kind: kind,
            timestamp: frame as f64 * 0.05,
            frame,
            payload,
        })
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ActorFactoryError::NotConnected)
        }
    }

    fn allocate_actor_id(&self) -> ActorId {
        self.next_actor_id.fetch_add(1, Ordering::SeqCst)
    }

    fn insert_actor(&self, blueprint: &ActorTemplate, kind: MockActorKind) -> ActorId {
        let actor_id = self.allocate_actor_id();
        let actor = MockActor {
            blueprint: blueprint.id.clone(),
            attributes: blueprint
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            kind,
            alive: true,
            listening: Arc::new(AtomicBool::new(false)),
            delivery: Arc::new(Mutex::new(None)),
        };
        lock(&self.actors).insert(actor_id, actor);
        actor_id
    }
}

impl Drop for MockWorld {
    fn drop(&mut self) {
        self.clock.running.store(false, Ordering::SeqCst);
    }
}

fn parse_attr(attributes: &HashMap<String, String>, key: &str, default: u32) -> u32 {
    attributes
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 旋转扫描的一圈点云，x, y, z, intensity (f32 LE)
fn lidar_payload(points: u32, frame: u64) -> SensorPayload {
    let mut data = Vec::with_capacity(points as usize * 16);
    let phase = (frame % 360) as f32 / 360.0 * TAU;
    for i in 0..points {
        let angle = phase + i as f32 / points.max(1) as f32 * TAU;
        let range = 10.0 + (i % 64) as f32 * 0.5;
        let point = [
            range * angle.cos(),
            range * angle.sin(),
            -1.6 + (i % 64) as f32 * 0.05,
            (i % 100) as f32 / 100.0,
        ];
        for value in point {
            data.extend_from_slice(&value.to_le_bytes());
        }
    }
    SensorPayload::PointCloud(PointCloudData::from_raw(Bytes::from(data)))
}

/// BGRA 渐变图
fn camera_payload(width: u32, height: u32, frame: u64) -> SensorPayload {
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, (frame % 256) as u8, 255]);
        }
    }
    SensorPayload::Image(ImageData {
        width,
        height,
        data: Bytes::from(data),
    })
}

/// Mock CARLA 客户端
///
/// Clone 共享同一个模拟世界。
#[derive(Debug, Clone)]
pub struct MockCarlaClient {
    world: Arc<MockWorld>,
}

impl MockCarlaClient {
    /// 创建默认 mock 客户端
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// 使用配置创建 mock 客户端
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            world: Arc::new(MockWorld::new(config)),
        }
    }

    /// 手动推进帧时钟
    pub fn advance(&self, frames: u64) -> u64 {
        self.world.clock.frame.fetch_add(frames, Ordering::AcqRel) + frames
    }

    /// 模拟器侧移除 actor（外部 despawn），不记录 Destroy 调用
    pub fn despawn(&self, actor_id: ActorId) {
        if let Some(actor) = lock(&self.world.actors).get_mut(&actor_id) {
            actor.alive = false;
        }
    }

    /// 调用记录快照
    pub fn calls(&self) -> Vec<SimCall> {
        lock(&self.world.calls).clone()
    }

    /// 某个调用在记录中的首次位置
    pub fn position_of(&self, call: &SimCall) -> Option<usize> {
        lock(&self.world.calls).iter().position(|c| c == call)
    }

    /// 对某个 actor 的 destroy 调用次数
    pub fn destroy_count(&self, actor_id: ActorId) -> usize {
        lock(&self.world.calls)
            .iter()
            .filter(|c| **c == SimCall::Destroy(actor_id))
            .count()
    }

    /// 获取当前已创建的 actor 数量
    pub fn actor_count(&self) -> usize {
        lock(&self.world.actors).len()
    }

    /// 存活 actor 数量
    pub fn alive_actor_count(&self) -> usize {
        lock(&self.world.actors).values().filter(|a| a.alive).count()
    }

    /// 车辆 autopilot 状态
    pub fn autopilot(&self, actor_id: ActorId) -> Option<bool> {
        match lock(&self.world.actors).get(&actor_id)?.kind {
            MockActorKind::Vehicle { autopilot } => Some(autopilot),
            MockActorKind::Sensor { .. } => None,
        }
    }

    /// 传感器 spawn 时生效的属性
    pub fn sensor_attribute(&self, actor_id: ActorId, key: &str) -> Option<String> {
        lock(&self.world.actors)
            .get(&actor_id)?
            .attributes
            .get(key)
            .cloned()
    }

    /// 传感器挂载的父 actor
    pub fn parent_of(&self, actor_id: ActorId) -> Option<ActorId> {
        match lock(&self.world.actors).get(&actor_id)?.kind {
            MockActorKind::Sensor { parent, .. } => Some(parent),
            MockActorKind::Vehicle { .. } => None,
        }
    }

    fn catalog_entry(&self, id: &str) -> Option<ActorTemplate> {
        self.world
            .config
            .catalog
            .iter()
            .find(|entry| entry.as_str() == id)
            .map(ActorTemplate::new)
    }
}

impl Default for MockCarlaClient {
    fn default() -> Self {
        Self::new()
    }
}

fn sensor_kind_of(blueprint: &str) -> Option<SensorKind> {
    if blueprint.starts_with("sensor.lidar.") {
        Some(SensorKind::Lidar)
    } else if blueprint.starts_with("sensor.camera.") {
        Some(SensorKind::Camera)
    } else {
        None
    }
}

impl CarlaClient for MockCarlaClient {
    #[instrument(name = "mock_carla_connect", skip(self), fields(host = %host, port))]
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        if self.world.config.unreachable {
            return Err(ActorFactoryError::connection(
                host,
                port,
                format!("no response within {timeout:?}"),
            ));
        }

        self.world.connected.store(true, Ordering::Release);
        self.world.record(SimCall::Connect);
        self.world.start_clock();
        Ok(())
    }

    async fn filter_blueprints(&self, pattern: &str) -> Result<Vec<ActorTemplate>> {
        self.world.ensure_connected()?;
        let needle = pattern.trim_matches('*');
        Ok(self
            .world
            .config
            .catalog
            .iter()
            .filter(|entry| entry.contains(needle))
            .map(ActorTemplate::new)
            .collect())
    }

    async fn find_blueprint(&self, id: &str) -> Result<Option<ActorTemplate>> {
        self.world.ensure_connected()?;
        Ok(self.catalog_entry(id))
    }

    async fn spawn_points(&self) -> Result<Vec<Transform>> {
        self.world.ensure_connected()?;
        Ok(self.world.config.spawn_points.clone())
    }

    #[instrument(
        name = "mock_carla_try_spawn",
        skip(self, template, _transform),
        fields(blueprint = %template.id)
    )]
    async fn try_spawn_actor(
        &self,
        template: &ActorTemplate,
        _transform: Transform,
    ) -> Result<Option<ActorId>> {
        self.world.ensure_connected()?;

        if self.world.config.spawn_point_occupied {
            debug!("spawn point occupied, returning no actor");
            return Ok(None);
        }

        let actor_id = self
            .world
            .insert_actor(template, MockActorKind::Vehicle { autopilot: false });
        self.world.record(SimCall::SpawnVehicle {
            actor_id,
            blueprint: template.id.clone(),
        });
        Ok(Some(actor_id))
    }

    #[instrument(
        name = "mock_carla_spawn_attached",
        skip(self, template, _transform),
        fields(blueprint = %template.id, parent_id)
    )]
    async fn spawn_attached(
        &self,
        template: &ActorTemplate,
        _transform: Transform,
        parent_id: ActorId,
    ) -> Result<ActorId> {
        self.world.ensure_connected()?;

        // 验证 parent 存在且存活
        let parent_alive = lock(&self.world.actors)
            .get(&parent_id)
            .is_some_and(|a| a.alive);
        if !parent_alive {
            return Err(ActorFactoryError::sensor_spawn(
                &template.id,
                parent_id,
                "parent actor not found",
            ));
        }

        if self.world.config.fail_attach.contains(&template.id) {
            return Err(ActorFactoryError::sensor_spawn(
                &template.id,
                parent_id,
                "mock failure",
            ));
        }

        let kind = sensor_kind_of(&template.id).ok_or_else(|| {
            ActorFactoryError::sensor_spawn(&template.id, parent_id, "not a supported sensor")
        })?;

        let actor_id = self
            .world
            .insert_actor(template, MockActorKind::Sensor { kind, parent: parent_id });
        self.world.record(SimCall::SpawnSensor {
            actor_id,
            parent_id,
            blueprint: template.id.clone(),
        });
        Ok(actor_id)
    }

    async fn set_autopilot(&self, actor_id: ActorId, enabled: bool) -> Result<()> {
        self.world.ensure_connected()?;
        let mut actors = lock(&self.world.actors);
        match actors.get_mut(&actor_id) {
            Some(MockActor {
                kind: MockActorKind::Vehicle { autopilot },
                alive: true,
                ..
            }) => {
                *autopilot = enabled;
            }
            _ => return Err(ActorFactoryError::ActorNotFound { actor_id }),
        }
        drop(actors);
        self.world.record(SimCall::SetAutopilot(actor_id, enabled));
        Ok(())
    }

    async fn is_alive(&self, actor_id: ActorId) -> Result<bool> {
        Ok(lock(&self.world.actors)
            .get(&actor_id)
            .is_some_and(|a| a.alive))
    }

    #[instrument(name = "mock_carla_destroy_actor", skip(self), fields(actor_id))]
    async fn destroy_actor(&self, actor_id: ActorId) -> Result<()> {
        self.world.record(SimCall::Destroy(actor_id));

        let mut actors = lock(&self.world.actors);
        let actor = actors
            .get_mut(&actor_id)
            .ok_or(ActorFactoryError::ActorNotFound { actor_id })?;

        if self.world.config.fail_destroy.contains(&actor.blueprint) {
            return Err(ActorFactoryError::DestroyFailed {
                actor_id,
                message: "mock failure".into(),
            });
        }

        actor.alive = false;
        actor.listening.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn current_frame(&self) -> Result<u64> {
        self.world.ensure_connected()?;
        Ok(self.world.frame())
    }

    fn sensor_source(&self, actor_id: ActorId, kind: SensorKind) -> Option<Box<dyn SensorSource>> {
        let matches = lock(&self.world.actors).get(&actor_id).is_some_and(|a| {
            matches!(a.kind, MockActorKind::Sensor { kind: k, .. } if k == kind)
        });
        if !matches {
            return None;
        }
        let sensor = MockSensor::new(actor_id, kind, Arc::clone(&self.world))?;
        Some(Box::new(sensor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_config() -> MockConfig {
        MockConfig {
            tick_interval: None,
            ..Default::default()
        }
    }

    async fn connected(config: MockConfig) -> MockCarlaClient {
        let mut client = MockCarlaClient::with_config(config);
        client
            .connect("localhost", 2000, Duration::from_secs(1))
            .await
            .unwrap();
        client
    }

    #[tokio::test]
    async fn test_mock_connect_unreachable() {
        let mut client = MockCarlaClient::with_config(MockConfig {
            unreachable: true,
            ..manual_config()
        });
        let err = client
            .connect("localhost", 2000, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ActorFactoryError::ConnectionFailed { .. }));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mock_requires_connect() {
        let client = MockCarlaClient::with_config(manual_config());
        assert!(matches!(
            client.current_frame().await,
            Err(ActorFactoryError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_mock_filter_and_find() {
        let client = connected(manual_config()).await;
        let tesla = client.filter_blueprints("vehicle.tesla.*").await.unwrap();
        assert_eq!(tesla.len(), 2);
        assert_eq!(tesla[0].id, "vehicle.tesla.model3");

        assert!(client
            .find_blueprint("sensor.camera.rgb")
            .await
            .unwrap()
            .is_some());
        assert!(client
            .find_blueprint("sensor.camera.depth")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_mock_spawn_vehicle_and_sensor() {
        let client = connected(manual_config()).await;

        let vehicle_id = client
            .try_spawn_actor(&ActorTemplate::new("vehicle.tesla.model3"), Transform::default())
            .await
            .unwrap()
            .unwrap();
        let mut camera = ActorTemplate::new("sensor.camera.rgb");
        camera.set_attribute("image_size_x", "64");
        let sensor_id = client
            .spawn_attached(&camera, Transform::at(1.2, 0.0, 1.5), vehicle_id)
            .await
            .unwrap();

        assert!(vehicle_id >= 1000);
        assert!(sensor_id > vehicle_id);
        assert_eq!(client.actor_count(), 2);
        assert_eq!(client.parent_of(sensor_id), Some(vehicle_id));
        assert_eq!(
            client.sensor_attribute(sensor_id, "image_size_x").as_deref(),
            Some("64")
        );
    }

    #[tokio::test]
    async fn test_mock_occupied_spawn_point() {
        let client = connected(MockConfig {
            spawn_point_occupied: true,
            ..manual_config()
        })
        .await;
        let spawned = client
            .try_spawn_actor(&ActorTemplate::new("vehicle.tesla.model3"), Transform::default())
            .await
            .unwrap();
        assert!(spawned.is_none());
        assert_eq!(client.actor_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_destroy_marks_dead() {
        let client = connected(manual_config()).await;
        let actor_id = client
            .try_spawn_actor(&ActorTemplate::new("vehicle.tesla.model3"), Transform::default())
            .await
            .unwrap()
            .unwrap();

        client.destroy_actor(actor_id).await.unwrap();
        assert!(!client.is_alive(actor_id).await.unwrap());
        assert_eq!(client.destroy_count(actor_id), 1);
        assert_eq!(client.alive_actor_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_manual_clock() {
        let client = connected(manual_config()).await;
        assert_eq!(client.current_frame().await.unwrap(), 1000);
        assert_eq!(client.advance(5), 1005);
        assert_eq!(client.current_frame().await.unwrap(), 1005);
    }

    #[tokio::test]
    async fn test_mock_ticking_clock_advances() {
        let client = connected(MockConfig {
            tick_interval: Some(Duration::from_millis(2)),
            ..Default::default()
        })
        .await;
        let start = client.current_frame().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(client.current_frame().await.unwrap() > start);
    }

    #[test]
    fn test_lidar_payload_layout() {
        let SensorPayload::PointCloud(pc) = lidar_payload(10, 3) else {
            panic!("expected point cloud");
        };
        assert_eq!(pc.num_points, 10);
        assert_eq!(pc.data.len(), 160);
    }

    #[test]
    fn test_camera_payload_layout() {
        let SensorPayload::Image(image) = camera_payload(8, 4, 7) else {
            panic!("expected image");
        };
        assert_eq!(image.data.len(), image.expected_len());
        // pixel (1, 0): B = x, G = y, R = frame, A = 255
        assert_eq!(&image.data[4..8], &[1, 0, 7, 255]);
    }
}
