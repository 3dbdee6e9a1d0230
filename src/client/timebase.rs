use super::ScopeClient;
use crate::error::ScopeError;
use crate::scpi::command::ParamValue;
use crate::scpi::response::parse_f64;

impl ScopeClient {
    /// Set the horizontal scale in seconds per division (`HORIZONTAL:SCALE`).
    /// The instrument rounds to the nearest supported 1-2-4 step; read back
    /// with [`horizontal_scale`](Self::horizontal_scale) for the value in
    /// effect.
    pub fn set_horizontal_scale(&mut self, seconds_per_div: f64) -> Result<(), ScopeError> {
        self.set_param("horizontal", "scale", ParamValue::Float(seconds_per_div))
    }

    pub fn horizontal_scale(&mut self) -> Result<f64, ScopeError> {
        let reply = self.query_param("horizontal", "scale")?;
        parse_f64(&reply)
    }

    /// Set the horizontal delay time in seconds (`HORIZONTAL:DELAY:TIME`),
    /// positioning the trigger point relative to screen center.
    pub fn set_horizontal_delay(&mut self, seconds: f64) -> Result<(), ScopeError> {
        self.set_param("horizontal", "delay_time", ParamValue::Float(seconds))
    }

    pub fn horizontal_delay(&mut self) -> Result<f64, ScopeError> {
        let reply = self.query_param("horizontal", "delay_time")?;
        parse_f64(&reply)
    }
}
