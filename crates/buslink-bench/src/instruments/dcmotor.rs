//! DC motor instrument.
//!
//! Exposes the controller parameters and measurements of an embedded
//! [`DcMotor`] model as a register block (32-bit access only):
//!
//! | offset | register     | behaviour                                       |
//! |--------|--------------|-------------------------------------------------|
//! | 0x00   | `controller` | controller selection (0 = PID, 1 = LQI)         |
//! | 0x04   | `lqi_l0`     | LQI angular-velocity error gain (f32)           |
//! | 0x08   | `lqi_l1`     | LQI current gain (f32)                          |
//! | 0x0C   | `lqi_li`     | LQI setpoint integral gain (f32)                |
//! | 0x10   | `pid_kp`     | proportional gain (f32)                         |
//! | 0x14   | `pid_ki`     | integral gain (f32)                             |
//! | 0x18   | `pid_kd`     | derivative gain (f32)                           |
//! | 0x1C   | `pid_d`      | derivative filter pole (f32)                    |
//! | 0x20   | `kff`        | feedforward gain (f32)                          |
//! | 0x24   | `reference`  | reference angular velocity (f32)                |
//! | 0x28   | `omega`      | measured angular velocity (f32, model output)   |
//! | 0x2C   | `control`    | control voltage (f32, drives the model)         |
//! | 0x30   | `step`       | writing any value advances the model one step;  |
//! |        |              | the stored bytes never change                   |
//! | 0x34   | `intf`       | interrupt flags; reading resets it to zero      |
//!
//! The firmware's control loop runs on the other side of the wire: it reads
//! `omega`, computes a control action with the gains it also keeps here,
//! writes `control`, then writes `step` to advance the plant.  Each step
//! latches the new `omega` back into the block, sets the sample-ready flag
//! in `intf`, and — on the flag's rising edge — fires the IRQ callback.

use buslink_core::peripheral::{AccessError, IrqCallback, Peripheral};
use buslink_core::regblock::RegisterBlock;
use tracing::trace;

use super::motor::{DcMotor, MotorParams};

/// Controller selection register.
pub const DCMOTOR_REG_CONTROLLER: u64 = 0x00;
/// Feedforward gain.
pub const DCMOTOR_REG_KFF: u64 = 0x20;
/// Reference angular velocity.
pub const DCMOTOR_REG_REFERENCE: u64 = 0x24;
/// Measured angular velocity (model output).
pub const DCMOTOR_REG_OMEGA: u64 = 0x28;
/// Control voltage (model input).
pub const DCMOTOR_REG_CONTROL: u64 = 0x2C;
/// Step trigger; writes advance the model and leave storage untouched.
pub const DCMOTOR_REG_STEP: u64 = 0x30;
/// Self-clearing interrupt flag register.
pub const DCMOTOR_REG_INTF: u64 = 0x34;

/// Sample-ready bit in the interrupt flag register.
pub const DCMOTOR_INTF_SAMPLE: u32 = 1 << 0;

const PID_KP: usize = 0x10;
const PID_KI: usize = 0x14;
const PID_KD: usize = 0x18;
const PID_D: usize = 0x1C;
const LQI_L0: usize = 0x04;
const LQI_L1: usize = 0x08;
const LQI_LI: usize = 0x0C;
const OMEGA: usize = 0x28;
const CONTROL: usize = 0x2C;
const INTF: usize = 0x34;
const REG_SIZE: usize = 0x38;

/// A DC motor plant behind a register block.
pub struct DcMotorInstrument {
    regs: RegisterBlock<REG_SIZE>,
    motor: DcMotor,
    irq_callback: Option<IrqCallback>,
}

impl Default for DcMotorInstrument {
    fn default() -> Self {
        Self::new(MotorParams::default())
    }
}

impl DcMotorInstrument {
    pub fn new(params: MotorParams) -> Self {
        let mut instrument = Self {
            regs: RegisterBlock::new(),
            motor: DcMotor::new(params),
            irq_callback: None,
        };
        instrument.load_default_gains();
        instrument
    }

    /// Tuning that tracks a step reference acceptably out of the box.
    fn load_default_gains(&mut self) {
        self.regs.set_f32_at(PID_KP, 0.683);
        self.regs.set_f32_at(PID_KI, 0.008);
        self.regs.set_f32_at(PID_KD, 2.225);
        self.regs.set_f32_at(PID_D, 0.85);
        self.regs.set_f32_at(LQI_L0, 3.338);
        self.regs.set_f32_at(LQI_L1, 3.357);
        self.regs.set_f32_at(LQI_LI, 0.040);
    }

    /// Direct view of the plant state, for observation and tests.
    pub fn motor(&self) -> &DcMotor {
        &self.motor
    }

    fn step_model(&mut self) {
        self.motor.voltage = self.regs.f32_at(CONTROL);
        self.motor.step();
        self.regs.set_f32_at(OMEGA, self.motor.omega);

        let intf = self.regs.u32_at(INTF);
        self.regs.set_u32_at(INTF, intf | DCMOTOR_INTF_SAMPLE);
        // Edge triggered: only a 0→1 transition of the flag raises the IRQ.
        if intf & DCMOTOR_INTF_SAMPLE == 0 {
            if let Some(cb) = &self.irq_callback {
                cb();
            }
        }
    }
}

impl Peripheral for DcMotorInstrument {
    fn reset(&mut self) {
        self.regs.clear();
        self.load_default_gains();
        self.motor.reset();
    }

    fn write32(&mut self, addr: u64, data: u64) -> Result<(), AccessError> {
        if addr == DCMOTOR_REG_STEP {
            // Actionable offset: storage stays untouched, the model advances.
            self.step_model();
            return Ok(());
        }
        self.regs.write32(addr, data)
    }

    fn read32(&mut self, addr: u64) -> Result<u64, AccessError> {
        let value = self.regs.read32(addr)?;
        if addr == DCMOTOR_REG_INTF {
            self.regs.set_u32_at(INTF, 0);
        }
        Ok(value)
    }

    fn register_irq_callback(&mut self, cb: IrqCallback) {
        self.irq_callback = Some(cb);
    }

    fn render(&mut self) {
        // Observation pass; a real visualizer plots these.
        trace!(
            omega = self.motor.omega,
            current = self.motor.current,
            position = self.motor.position,
            "dcmotor state"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn instrument_with_irq_counter() -> (DcMotorInstrument, Arc<AtomicUsize>) {
        let mut instrument = DcMotorInstrument::default();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        instrument.register_irq_callback(Box::new(move || {
            c.fetch_add(1, Ordering::Relaxed);
        }));
        (instrument, count)
    }

    #[test]
    fn test_plain_registers_hold_written_values() {
        let mut m = DcMotorInstrument::default();
        m.write32(DCMOTOR_REG_REFERENCE, u64::from(2.4f32.to_bits()))
            .unwrap();
        assert_eq!(
            m.read32(DCMOTOR_REG_REFERENCE),
            Ok(u64::from(2.4f32.to_bits()))
        );
    }

    #[test]
    fn test_default_gains_are_loaded() {
        let mut m = DcMotorInstrument::default();
        assert_eq!(m.read32(0x10), Ok(u64::from(0.683f32.to_bits())));
        assert_eq!(m.read32(0x04), Ok(u64::from(3.338f32.to_bits())));
    }

    #[test]
    fn test_step_write_advances_the_model_without_touching_storage() {
        let (mut m, _) = instrument_with_irq_counter();

        // Drive hard so one step visibly changes the armature current.
        m.write32(DCMOTOR_REG_CONTROL, u64::from(12.0f32.to_bits()))
            .unwrap();

        let before = m.read32(DCMOTOR_REG_STEP).unwrap();
        m.write32(DCMOTOR_REG_STEP, 0xFFFF_FFFF).unwrap();

        assert_eq!(m.read32(DCMOTOR_REG_STEP), Ok(before));
        assert!(m.motor().current > 0.0);
    }

    #[test]
    fn test_step_latches_omega_into_the_block() {
        let mut m = DcMotorInstrument::default();
        m.write32(DCMOTOR_REG_CONTROL, u64::from(12.0f32.to_bits()))
            .unwrap();
        for _ in 0..500 {
            m.write32(DCMOTOR_REG_STEP, 1).unwrap();
        }

        let omega_bits = m.read32(DCMOTOR_REG_OMEGA).unwrap();
        let omega = f32::from_bits(omega_bits as u32);
        assert!(omega > 0.0, "omega = {omega}");
        assert_eq!(omega, m.motor().omega);
    }

    #[test]
    fn test_intf_clears_on_read_and_reports_sample_flag() {
        let (mut m, _) = instrument_with_irq_counter();
        m.write32(DCMOTOR_REG_STEP, 0).unwrap();

        assert_eq!(
            m.read32(DCMOTOR_REG_INTF),
            Ok(u64::from(DCMOTOR_INTF_SAMPLE))
        );
        assert_eq!(m.read32(DCMOTOR_REG_INTF), Ok(0));
    }

    #[test]
    fn test_irq_fires_only_on_the_flag_edge() {
        let (mut m, count) = instrument_with_irq_counter();

        m.write32(DCMOTOR_REG_STEP, 0).unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 1);

        // Flag still pending: further steps raise nothing new.
        m.write32(DCMOTOR_REG_STEP, 0).unwrap();
        m.write32(DCMOTOR_REG_STEP, 0).unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 1);

        // Reading clears the flag; the next step is a fresh edge.
        m.read32(DCMOTOR_REG_INTF).unwrap();
        m.write32(DCMOTOR_REG_STEP, 0).unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_out_of_range_access_is_rejected() {
        let mut m = DcMotorInstrument::default();
        assert_eq!(m.read32(REG_SIZE as u64), Err(AccessError::OutOfRange));
        assert_eq!(m.write32(0x35, 0), Err(AccessError::OutOfRange));
    }

    #[test]
    fn test_unsupported_widths_report_unsupported_everywhere() {
        let mut m = DcMotorInstrument::default();
        for addr in [0u64, DCMOTOR_REG_STEP, DCMOTOR_REG_INTF] {
            assert_eq!(m.read8(addr), Err(AccessError::Unsupported));
            assert_eq!(m.read16(addr), Err(AccessError::Unsupported));
            assert_eq!(m.write8(addr, 0), Err(AccessError::Unsupported));
            assert_eq!(m.write16(addr, 0), Err(AccessError::Unsupported));
        }
    }

    #[test]
    fn test_reset_restores_defaults_and_stops_the_motor() {
        let mut m = DcMotorInstrument::default();
        m.write32(DCMOTOR_REG_CONTROL, u64::from(12.0f32.to_bits()))
            .unwrap();
        for _ in 0..100 {
            m.write32(DCMOTOR_REG_STEP, 0).unwrap();
        }

        m.reset();

        assert_eq!(m.motor().omega, 0.0);
        assert_eq!(m.read32(DCMOTOR_REG_OMEGA), Ok(0));
        assert_eq!(m.read32(0x10), Ok(u64::from(0.683f32.to_bits())));
    }
}
