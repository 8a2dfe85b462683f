//! Discrete-time DC motor model.
//!
//! Two-state armature model integrated with forward Euler:
//!
//! ```text
//! dω/dt = (K·i − b·ω) / J        (mechanical)
//! di/dt = (u − K·ω − R·i) / L    (electrical)
//! ```
//!
//! The model is opaque to the bus: the instrument advances it by exactly one
//! step per write to its step-trigger register and reads back `ω`.  Nothing
//! here knows about registers or the protocol.

/// Physical parameters of the motor.
#[derive(Debug, Clone, Copy)]
pub struct MotorParams {
    /// Rotor inertia (kg·m²).
    pub inertia: f32,
    /// Viscous friction constant (N·m·s).
    pub friction: f32,
    /// Motor constant, used for both back-EMF and torque (V/rad/s, N·m/A).
    pub motor_constant: f32,
    /// Armature resistance (Ω).
    pub resistance: f32,
    /// Armature inductance (H).
    pub inductance: f32,
    /// Integration step (s).
    pub dt: f32,
}

impl Default for MotorParams {
    fn default() -> Self {
        Self {
            inertia: 0.01,
            friction: 0.1,
            motor_constant: 0.01,
            resistance: 1.0,
            inductance: 0.5,
            dt: 0.001,
        }
    }
}

/// The motor state advanced one step at a time.
#[derive(Debug, Clone)]
pub struct DcMotor {
    params: MotorParams,
    /// Angular velocity ω (rad/s).
    pub omega: f32,
    /// Armature current i (A).
    pub current: f32,
    /// Integrated rotor position (rad), wrapped to ±π.
    pub position: f32,
    /// Drive voltage u (V); set by the instrument before each step.
    pub voltage: f32,
}

impl DcMotor {
    pub fn new(params: MotorParams) -> Self {
        Self {
            params,
            omega: 0.0,
            current: 0.0,
            position: 0.0,
            voltage: 0.0,
        }
    }

    /// Returns the motor to standstill without touching the parameters.
    pub fn reset(&mut self) {
        self.omega = 0.0;
        self.current = 0.0;
        self.position = 0.0;
        self.voltage = 0.0;
    }

    /// Advances the model by one integration step.
    pub fn step(&mut self) {
        let p = &self.params;
        let d_omega = (p.motor_constant * self.current - p.friction * self.omega) / p.inertia;
        let d_current =
            (self.voltage - p.motor_constant * self.omega - p.resistance * self.current)
                / p.inductance;

        self.omega += d_omega * p.dt;
        self.current += d_current * p.dt;

        self.position += self.omega * p.dt;
        if self.position > std::f32::consts::PI {
            self.position -= 2.0 * std::f32::consts::PI;
        } else if self.position < -std::f32::consts::PI {
            self.position += 2.0 * std::f32::consts::PI;
        }
    }
}
