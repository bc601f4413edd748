//! 车辆 actor

use contracts::{
    AckermannControl, AckermannSettings, AckermannSettingsPatch, NativeVehicle, SimResult,
    VehicleControl, VehicleControlPatch, VehicleStatus, WheelLocation, WheelSteerAngles,
};
use tracing::instrument;

use crate::error::{ActorFactoryError, Result};
use crate::handle::ActorHandle;

/// actor 句柄的车辆视图
///
/// 所有操作都要求句柄已绑定。
pub struct Vehicle<'a> {
    handle: &'a ActorHandle,
}

impl<'a> Vehicle<'a> {
    pub(crate) fn new(handle: &'a ActorHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &ActorHandle {
        self.handle
    }

    fn with_native<T>(&self, f: impl FnOnce(&dyn NativeVehicle) -> SimResult<T>) -> Result<T> {
        let native = self.handle.ensure_alive()?;
        let vehicle = native.as_vehicle().ok_or_else(|| {
            ActorFactoryError::invalid_argument(
                "actor",
                format!("native actor {} has no vehicle interface", native.id()),
            )
        })?;
        Ok(f(vehicle)?)
    }

    /// 速度、加速度、当前控制量与车轮角度
    pub fn status(&self) -> Result<VehicleStatus> {
        let velocity = self.handle.velocity()?;
        let acceleration = self.handle.acceleration()?;

        self.with_native(|vehicle| {
            let mut wheel_steer = WheelSteerAngles::default();
            for wheel in WheelLocation::ALL {
                wheel_steer.set(wheel, vehicle.wheel_steer_angle(wheel)?);
            }
            Ok(VehicleStatus {
                speed: velocity.magnitude(),
                velocity,
                acceleration,
                control: vehicle.control()?,
                wheel_steer,
            })
        })
    }

    /// 直接控制，超出范围的值被截断
    #[instrument(name = "vehicle_apply_control", skip(self), fields(handle = %self.handle.id()))]
    pub fn apply_control(&self, control: &VehicleControl) -> Result<()> {
        let control = control.clamped();
        self.with_native(|vehicle| vehicle.apply_control(&control))
    }

    /// 直接控制，未设置的字段保持当前值
    pub fn override_control(&self, patch: &VehicleControlPatch) -> Result<()> {
        let current = self.with_native(|vehicle| vehicle.control())?;
        self.apply_control(&patch.apply_to(&current))
    }

    #[instrument(name = "vehicle_apply_ackermann", skip(self), fields(handle = %self.handle.id()))]
    pub fn apply_ackermann_control(&self, control: &AckermannControl) -> Result<()> {
        self.with_native(|vehicle| vehicle.apply_ackermann_control(control))
    }

    pub fn ackermann_settings(&self) -> Result<AckermannSettings> {
        self.with_native(|vehicle| vehicle.ackermann_settings())
    }

    pub fn set_ackermann_settings(&self, settings: &AckermannSettings) -> Result<()> {
        self.with_native(|vehicle| vehicle.apply_ackermann_settings(settings))
    }

    /// 修改部分 PID 参数，未设置的字段保持当前值
    pub fn override_ackermann_settings(&self, patch: &AckermannSettingsPatch) -> Result<()> {
        self.with_native(|vehicle| {
            let current = vehicle.ackermann_settings()?;
            vehicle.apply_ackermann_settings(&patch.apply_to(&current))
        })
    }

    /// 覆盖部分车轮的显示转向角 (度)
    ///
    /// 未列出的车轮设为当前物理角度。
    pub fn override_visual_steer_angle(&self, overrides: &[(WheelLocation, f32)]) -> Result<()> {
        self.with_native(|vehicle| {
            for wheel in WheelLocation::ALL {
                let degrees = match overrides.iter().find(|(w, _)| *w == wheel) {
                    Some((_, degrees)) => *degrees,
                    None => vehicle.wheel_steer_angle(wheel)?,
                };
                vehicle.set_wheel_steer_direction(wheel, degrees)?;
            }
            Ok(())
        })
    }
}
