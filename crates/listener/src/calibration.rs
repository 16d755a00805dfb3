//! Camera parameters and extrinsic of calibrated listeners.
//!
//! Parameters are rescaled by the listener's resize factor whenever they
//! are set or loaded. Saving writes the rescaled values.

use std::path::Path;
use std::sync::Arc;

use config_loader::camera::{self, OverwritePolicy};
use contracts::{CamParameters, Extrinsic, Result};
use tracing::info;

use crate::listener::SensorListener;

impl SensorListener {
    pub fn cam_params(&self) -> Result<Arc<CamParameters>> {
        self.require_calibration()?;
        Ok(self.frame_context.read().cam_params.clone())
    }

    pub fn extrinsic(&self) -> Result<Arc<Extrinsic>> {
        self.require_calibration()?;
        Ok(self.frame_context.read().extrinsic.clone())
    }

    /// Name of the sensor this listener's extrinsic is relative to
    pub fn identity_name(&self) -> Option<&str> {
        self.calibration
            .as_ref()
            .and_then(|c| c.identity_name.as_deref())
    }

    /// Replace the camera parameters; frames produced afterwards use them
    pub fn set_cam_params(&self, params: &CamParameters) -> Result<()> {
        self.require_calibration()?;
        self.frame_context.write().cam_params = Arc::new(params.rescaled(self.resize_factor));
        Ok(())
    }

    pub fn set_extrinsic(&self, extrinsic: Extrinsic) -> Result<()> {
        self.require_calibration()?;
        self.frame_context.write().extrinsic = Arc::new(extrinsic);
        Ok(())
    }

    /// Write `{name}_parameters.json` under `dir`; returns whether it was written
    pub fn save_parameters(&self, dir: &Path, policy: OverwritePolicy) -> Result<bool> {
        let params = self.cam_params()?;
        camera::save_cam_params(dir, self.name(), &params, policy)
    }

    pub fn load_parameters(&self, dir: &Path) -> Result<()> {
        self.require_calibration()?;
        let params = camera::load_cam_params(dir, self.name())?;
        self.set_cam_params(&params)?;
        info!(listener = %self.name(), dir = %dir.display(), "Loaded camera parameters");
        Ok(())
    }

    /// Write `{name}_{identity}_extrinsic.json` under `dir`
    pub fn save_extrinsic(&self, dir: &Path, policy: OverwritePolicy) -> Result<bool> {
        let extrinsic = self.extrinsic()?;
        camera::save_extrinsic(dir, self.name(), self.identity_name(), &extrinsic, policy)
    }

    pub fn load_extrinsic(&self, dir: &Path) -> Result<()> {
        self.require_calibration()?;
        let extrinsic = camera::load_extrinsic(dir, self.name(), self.identity_name())?;
        self.set_extrinsic(extrinsic)?;
        info!(listener = %self.name(), dir = %dir.display(), "Loaded extrinsic");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::mock::MockSensor;
    use crate::registry::NameRegistry;
    use crate::SensorListener;
    use config_loader::camera::OverwritePolicy;
    use contracts::{CamParameters, Extrinsic, ListenerError};
    use std::sync::Arc;

    #[test]
    fn test_uncalibrated_listener_rejects_access() {
        let registry = NameRegistry::new();
        let listener = SensorListener::builder(&registry, Arc::new(MockSensor::new(10)))
            .build()
            .unwrap();
        assert!(!listener.capabilities().has_calibration);
        assert!(matches!(
            listener.cam_params(),
            Err(ListenerError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_default_params_rescaled_at_construction() {
        let registry = NameRegistry::new();
        let listener = SensorListener::builder(&registry, Arc::new(MockSensor::new(10)))
            .resize_factor(0.5)
            .calibrated(None)
            .build()
            .unwrap();
        let params = listener.cam_params().unwrap();
        assert_eq!(params.fx(), 50.0);
        assert_eq!(params.cx(), 25.0);
    }

    #[test]
    fn test_parameters_round_trip_through_dir() {
        let dir = tempfile::tempdir().unwrap();
        let registry = NameRegistry::new();
        let listener = SensorListener::builder(&registry, Arc::new(MockSensor::new(10)))
            .name("front")
            .identity_name("lidar")
            .calibrated(None)
            .build()
            .unwrap();

        listener
            .set_cam_params(&CamParameters::pinhole(200.0, 210.0, 64.0, 48.0))
            .unwrap();
        let mut pose = Extrinsic::identity();
        pose[(0, 3)] = 1.5;
        listener.set_extrinsic(pose).unwrap();

        assert!(listener.save_parameters(dir.path(), OverwritePolicy::Overwrite).unwrap());
        assert!(listener.save_extrinsic(dir.path(), OverwritePolicy::Overwrite).unwrap());
        assert!(!listener
            .save_parameters(dir.path(), OverwritePolicy::KeepExisting)
            .unwrap());
        drop(listener);

        let reloaded = SensorListener::builder(&registry, Arc::new(MockSensor::new(10)))
            .name("front")
            .identity_name("lidar")
            .calibrated(Some(dir.path().to_path_buf()))
            .build()
            .unwrap();
        assert_eq!(reloaded.cam_params().unwrap().fy(), 210.0);
        assert_eq!(reloaded.extrinsic().unwrap()[(0, 3)], 1.5);
    }

    #[test]
    fn test_extrinsic_needs_identity() {
        let dir = tempfile::tempdir().unwrap();
        let registry = NameRegistry::new();
        let listener = SensorListener::builder(&registry, Arc::new(MockSensor::new(10)))
            .calibrated(None)
            .build()
            .unwrap();
        assert!(matches!(
            listener.save_extrinsic(dir.path(), OverwritePolicy::Overwrite),
            Err(ListenerError::ConfigValidation { .. })
        ));
    }
}
