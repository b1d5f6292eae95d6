// src/robot.rs
//
// =============================================================================
// ROBOGRAPH: ROBOT ADAPTERS (v 0.1 )
// =============================================================================
//
// The Hexagonal Port.
//
// Responsibilities:
// 1. Define the `RobotAdapter` trait (The Contract the runtime consumes).
// 2. Dispatch robot brands to concrete implementations.
//
// Real SDK adapters (Unitree, MuJoCo, ...) live outside the core; the
// bundled `SimulatedAdapter` records what the runtime asked for, which is
// enough for the CLI `run` mode and the test suite.

use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

// ============================================================================
// 1. THE ADAPTER TRAIT (The Contract)
// ============================================================================

pub trait RobotAdapter: Send + Sync {
    /// Establish a connection to the robot or simulator.
    fn connect(&self, opts: &Value) -> bool;

    /// Execute a named action. Returns false when the robot refused or
    /// failed; the runtime records but does not abort on failure.
    fn run_action(&self, action: &str, params: &Value) -> bool;

    /// Immediately stop all robot activity.
    fn stop(&self);

    /// Latest sensor readings.
    fn get_sensor_data(&self) -> Map<String, Value>;

    /// Adapter health / connectivity status.
    fn health(&self) -> Map<String, Value>;
}

// ============================================================================
// 2. SIMULATED ADAPTER
// ============================================================================

/// In-process adapter: every call is recorded, sensor reads serve canned
/// data. Deterministic on purpose.
pub struct SimulatedAdapter {
    robot_type: String,
    connected: AtomicBool,
    stopped: AtomicBool,
    actions: Mutex<Vec<String>>,
}

impl SimulatedAdapter {
    pub fn new(robot_type: &str) -> Self {
        Self {
            robot_type: robot_type.to_string(),
            connected: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            actions: Mutex::new(Vec::new()),
        }
    }

    /// Actions executed so far, in call order.
    pub fn executed_actions(&self) -> Vec<String> {
        self.actions.lock().expect("adapter poisoned").clone()
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl RobotAdapter for SimulatedAdapter {
    fn connect(&self, _opts: &Value) -> bool {
        self.connected.store(true, Ordering::SeqCst);
        log::info!("🔌 Simulated {} adapter connected", self.robot_type);
        true
    }

    fn run_action(&self, action: &str, _params: &Value) -> bool {
        log::info!("🤖 [{}] run_action: {}", self.robot_type, action);
        self.actions
            .lock()
            .expect("adapter poisoned")
            .push(action.to_string());
        true
    }

    fn stop(&self) {
        log::info!("🛑 [{}] stop", self.robot_type);
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn get_sensor_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("imu".to_string(), json!({"roll": 0.0, "pitch": 0.0, "yaw": 0.0}));
        data.insert("battery".to_string(), json!(1.0));
        data.insert("robot_type".to_string(), json!(self.robot_type));
        data
    }

    fn health(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert(
            "connected".to_string(),
            json!(self.connected.load(Ordering::SeqCst)),
        );
        data.insert("robot_type".to_string(), json!(self.robot_type));
        data
    }
}

// ============================================================================
// 3. THE DISPATCHER (The Factory)
// ============================================================================

pub struct AdapterFactory;

impl AdapterFactory {
    /// Returns a boxed adapter for the requested brand. Every brand
    /// currently routes to the simulator; hardware adapters plug in here.
    pub fn for_brand(brand: &str, robot_type: &str) -> Box<dyn RobotAdapter> {
        match brand {
            "unitree" => Box::new(SimulatedAdapter::new(robot_type)),
            other => {
                log::warn!("Unknown brand '{other}', using simulated adapter");
                Box::new(SimulatedAdapter::new(robot_type))
            }
        }
    }
}
