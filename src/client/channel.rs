use super::ScopeClient;
use crate::error::ScopeError;
use crate::scpi::command::ParamValue;
use crate::scpi::response::{parse_f64, parse_flag};
use crate::types::{Channel, Coupling};

impl ScopeClient {
    /// Set the vertical scale of a channel in volts per division
    /// (`CHx:SCALE`).
    ///
    /// # Errors
    /// Returns `ScopeError::InvalidParameter` for values outside the
    /// registered range before anything is transmitted, and
    /// `ScopeError::InstrumentRejected` when the firmware refuses a value
    /// the coarse range check allowed (e.g. finer than the probe supports).
    pub fn set_channel_scale(&mut self, channel: Channel, volts_per_div: f64) -> Result<(), ScopeError> {
        self.set_param(channel.subsystem(), "scale", ParamValue::Float(volts_per_div))
    }

    /// Vertical scale of a channel in volts per division.
    pub fn channel_scale(&mut self, channel: Channel) -> Result<f64, ScopeError> {
        let reply = self.query_param(channel.subsystem(), "scale")?;
        parse_f64(&reply)
    }

    /// Set the vertical position of a channel in divisions (`CHx:POSITION`).
    pub fn set_channel_position(&mut self, channel: Channel, divisions: f64) -> Result<(), ScopeError> {
        self.set_param(channel.subsystem(), "position", ParamValue::Float(divisions))
    }

    pub fn channel_position(&mut self, channel: Channel) -> Result<f64, ScopeError> {
        let reply = self.query_param(channel.subsystem(), "position")?;
        parse_f64(&reply)
    }

    /// Set the vertical offset of a channel in volts (`CHx:OFFSET`).
    pub fn set_channel_offset(&mut self, channel: Channel, volts: f64) -> Result<(), ScopeError> {
        self.set_param(channel.subsystem(), "offset", ParamValue::Float(volts))
    }

    pub fn channel_offset(&mut self, channel: Channel) -> Result<f64, ScopeError> {
        let reply = self.query_param(channel.subsystem(), "offset")?;
        parse_f64(&reply)
    }

    /// Set the input coupling of a channel (`CHx:COUPLING`).
    pub fn set_coupling(&mut self, channel: Channel, coupling: Coupling) -> Result<(), ScopeError> {
        self.set_param(
            channel.subsystem(),
            "coupling",
            ParamValue::Token(coupling.mnemonic().to_string()),
        )
    }

    pub fn coupling(&mut self, channel: Channel) -> Result<Coupling, ScopeError> {
        let reply = self.query_param(channel.subsystem(), "coupling")?;
        Coupling::from_response(&reply)
    }

    /// Set the probe gain factor (`CHx:PROBE:GAIN`). 1.0 for a 1x probe,
    /// 0.1 for a 10x attenuating probe.
    pub fn set_probe_gain(&mut self, channel: Channel, gain: f64) -> Result<(), ScopeError> {
        self.set_param(channel.subsystem(), "probe_gain", ParamValue::Float(gain))
    }

    pub fn probe_gain(&mut self, channel: Channel) -> Result<f64, ScopeError> {
        let reply = self.query_param(channel.subsystem(), "probe_gain")?;
        parse_f64(&reply)
    }

    /// Show or hide a channel trace (`SELECT:CHx`). A hidden channel cannot
    /// be used as a waveform transfer source; the transfer session turns the
    /// source on itself.
    pub fn set_channel_display(&mut self, channel: Channel, on: bool) -> Result<(), ScopeError> {
        self.set_param("select", channel.subsystem(), ParamValue::Flag(on))
    }

    pub fn channel_display(&mut self, channel: Channel) -> Result<bool, ScopeError> {
        let reply = self.query_param("select", channel.subsystem())?;
        parse_flag(&reply)
    }
}

#[cfg(test)]
mod tests {
    use crate::client::tests::{IDN, connected};
    use crate::error::ScopeError;
    use crate::transport::mock::MockTransport;
    use crate::types::{Channel, Coupling};

    #[test]
    fn scale_set_get_round_trip() {
        let mock = MockTransport::new()
            .reply_line(IDN)
            .reply_no_events()
            .reply_line("100.0E-3");
        let writes = mock.writes();
        let mut scope = connected(mock);

        scope.set_channel_scale(Channel::Ch1, 0.1).unwrap();
        let scale = scope.channel_scale(Channel::Ch1).unwrap();
        assert_eq!(scale, 0.1);

        let writes = writes.lock().unwrap();
        assert_eq!(
            writes.as_slice(),
            ["*IDN?", "CH1:SCALE 1E-1", "EVMSG?", "CH1:SCALE?"]
        );
    }

    #[test]
    fn coupling_round_trip_uses_tokens() {
        let mock = MockTransport::new()
            .reply_line(IDN)
            .reply_no_events()
            .reply_line("AC");
        let mut scope = connected(mock);
        scope.set_coupling(Channel::Ch2, Coupling::Ac).unwrap();
        assert_eq!(scope.coupling(Channel::Ch2).unwrap(), Coupling::Ac);
    }

    #[test]
    fn display_flag_round_trip() {
        let mock = MockTransport::new()
            .reply_line(IDN)
            .reply_no_events()
            .reply_line("1");
        let mut scope = connected(mock);
        scope.set_channel_display(Channel::Ch4, true).unwrap();
        assert!(scope.channel_display(Channel::Ch4).unwrap());
    }

    #[test]
    fn firmware_rejection_surfaces_as_instrument_rejected() {
        let mock = MockTransport::new()
            .reply_line(IDN)
            .reply_line("2202,\"Set value out of range\"")
            .reply_no_events();
        let mut scope = connected(mock);
        let err = scope.set_channel_scale(Channel::Ch1, 0.002).unwrap_err();
        match err {
            ScopeError::InstrumentRejected(events) => {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].code, 2202);
            }
            other => panic!("expected InstrumentRejected, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_scale_never_hits_the_wire() {
        let mock = MockTransport::new().reply_line(IDN);
        let writes = mock.writes();
        let mut scope = connected(mock);
        let err = scope.set_channel_scale(Channel::Ch1, 1e6).unwrap_err();
        assert!(matches!(err, ScopeError::InvalidParameter { .. }));
        assert_eq!(writes.lock().unwrap().as_slice(), ["*IDN?"]);
    }
}
