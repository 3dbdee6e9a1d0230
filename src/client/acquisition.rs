use super::ScopeClient;
use crate::error::ScopeError;
use crate::scpi::command::ParamValue;
use crate::scpi::response::{parse_flag, parse_i64};
use crate::types::AcquisitionMode;

impl ScopeClient {
    /// Start continuous acquisition (`ACQUIRE:STATE RUN`).
    pub fn run(&mut self) -> Result<(), ScopeError> {
        self.set_param("acquire", "state", ParamValue::Token("RUN".to_string()))
    }

    /// Stop acquisition (`ACQUIRE:STATE STOP`).
    pub fn stop(&mut self) -> Result<(), ScopeError> {
        self.set_param("acquire", "state", ParamValue::Token("STOP".to_string()))
    }

    /// Arm a single-sequence acquisition: the scope stops by itself after
    /// one complete acquisition (`ACQUIRE:STOPAFTER SEQUENCE` + RUN).
    pub fn single(&mut self) -> Result<(), ScopeError> {
        self.set_param(
            "acquire",
            "stop_after",
            ParamValue::Token("SEQUENCE".to_string()),
        )?;
        self.run()
    }

    /// True while the acquisition system is running (`ACQUIRE:STATE?`).
    pub fn is_acquiring(&mut self) -> Result<bool, ScopeError> {
        let reply = self.query_param("acquire", "state")?;
        parse_flag(&reply)
    }

    /// Set the acquisition mode (`ACQUIRE:MODE`).
    pub fn set_acquisition_mode(&mut self, mode: AcquisitionMode) -> Result<(), ScopeError> {
        self.set_param(
            "acquire",
            "mode",
            ParamValue::Token(mode.mnemonic().to_string()),
        )
    }

    pub fn acquisition_mode(&mut self) -> Result<AcquisitionMode, ScopeError> {
        let reply = self.query_param("acquire", "mode")?;
        AcquisitionMode::from_response(&reply)
    }

    /// Number of acquisitions combined in AVERAGE mode (`ACQUIRE:NUMAVG`).
    /// The firmware accepts powers of two from 2 to 512.
    pub fn set_average_count(&mut self, count: u16) -> Result<(), ScopeError> {
        self.set_param("acquire", "num_averages", ParamValue::Int(count as i64))
    }

    /// Record length of the waveform transfer source
    /// (`WFMOUTPRE:RECORDLENGTH?`).
    pub fn record_length(&mut self) -> Result<usize, ScopeError> {
        let reply = self.query_param("wfmoutpre", "record_length")?;
        let length = parse_i64(&reply)?;
        if length < 0 {
            return Err(ScopeError::UnexpectedResponseShape(format!(
                "negative record length: {length}"
            )));
        }
        Ok(length as usize)
    }
}

#[cfg(test)]
mod tests {
    use crate::client::tests::{IDN, connected};
    use crate::transport::mock::MockTransport;
    use crate::types::AcquisitionMode;

    #[test]
    fn mode_round_trip_with_abbreviated_reply() {
        let mock = MockTransport::new()
            .reply_line(IDN)
            .reply_no_events()
            .reply_line("SAM");
        let mut scope = connected(mock);
        scope
            .set_acquisition_mode(AcquisitionMode::Sample)
            .unwrap();
        assert_eq!(
            scope.acquisition_mode().unwrap(),
            AcquisitionMode::Sample
        );
    }

    #[test]
    fn single_arms_sequence_then_runs() {
        let mock = MockTransport::new()
            .reply_line(IDN)
            .reply_no_events()
            .reply_no_events();
        let writes = mock.writes();
        let mut scope = connected(mock);
        scope.single().unwrap();
        let writes = writes.lock().unwrap();
        let commands: Vec<_> = writes.iter().filter(|w| !w.ends_with('?')).collect();
        assert_eq!(commands, ["ACQUIRE:STOPAFTER SEQUENCE", "ACQUIRE:STATE RUN"]);
    }

    #[test]
    fn state_query_parses_flag() {
        let mock = MockTransport::new().reply_line(IDN).reply_line("1");
        let mut scope = connected(mock);
        assert!(scope.is_acquiring().unwrap());
    }

    #[test]
    fn record_length_parses_integer() {
        let mock = MockTransport::new().reply_line(IDN).reply_line("1250");
        let mut scope = connected(mock);
        assert_eq!(scope.record_length().unwrap(), 1250);
    }
}
