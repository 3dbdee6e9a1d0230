//! Waveform transfer orchestration.
//!
//! A transfer is a strictly ordered multi-step protocol: select the source,
//! pin down the binary encoding, synchronize on operation-complete, fetch the
//! preamble, read the curve block, scale, and finally verify the instrument
//! did not reject any step. The preamble is re-queried on every fetch; it
//! describes the configuration in effect at fetch time and any configuration
//! change invalidates it.

use log::{debug, warn};

use super::ScopeClient;
use crate::error::ScopeError;
use crate::scpi::command::{self, ParamValue, ScpiRequest};
use crate::scpi::waveform::{Encoding, Waveform, WaveformPreamble};
use crate::types::{AcquisitionMode, WaveformSource};

impl ScopeClient {
    /// Fetch one waveform from `source`, running the full transfer protocol.
    ///
    /// # Errors
    /// Besides transport and framing errors, fails with
    /// `ScopeError::InstrumentRejected` when the post-transfer error-queue
    /// drain reports events; the decoded waveform is discarded in that case
    /// rather than returned alongside the error.
    ///
    /// # Examples
    /// ```no_run
    /// use tekscope::{Channel, ScopeClient};
    ///
    /// let mut scope = ScopeClient::new("192.168.1.40", 4000)?;
    /// let wf = scope.fetch_waveform(Channel::Ch2)?;
    /// for (t, v) in wf.samples().take(5) {
    ///     println!("{t:.9} s  {v:.4} V");
    /// }
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn fetch_waveform(
        &mut self,
        source: impl Into<WaveformSource>,
    ) -> Result<Waveform, ScopeError> {
        let source = source.into();
        debug!("fetching waveform from {}", source.mnemonic());
        let preamble = self.prepare_transfer(source)?;
        let codes = self.read_curve(&preamble)?;
        let waveform = preamble.scale(&codes, source.mnemonic());
        self.session().check_error_queue()?;
        Ok(waveform)
    }

    /// Fetch `count` captures from `source` and average them sample-wise.
    ///
    /// The DPO2000 cannot transfer curves while its acquisition system is in
    /// AVERAGE mode, so averaging happens host-side over repeated `CURVE?`
    /// reads. `count` is rounded up to the next power of two. All reads
    /// share one preamble, which is sound because the configuration cannot
    /// change between them within this call.
    pub fn fetch_waveform_averaged(
        &mut self,
        source: impl Into<WaveformSource>,
        count: usize,
    ) -> Result<Waveform, ScopeError> {
        let source = source.into();
        let rounds = count.max(1).next_power_of_two();
        debug!(
            "averaging {rounds} captures from {}",
            source.mnemonic()
        );

        if self.acquisition_mode()? == AcquisitionMode::Average {
            self.set_acquisition_mode(AcquisitionMode::Sample)?;
        }

        let preamble = self.prepare_transfer(source)?;
        let mut sum = self.read_curve(&preamble)?;
        for _ in 1..rounds {
            let codes = self.read_curve(&preamble)?;
            if codes.len() != sum.len() {
                return Err(ScopeError::UnexpectedResponseShape(format!(
                    "record length changed mid-average: {} then {} points",
                    sum.len(),
                    codes.len()
                )));
            }
            for (acc, code) in sum.iter_mut().zip(codes) {
                *acc += code;
            }
        }
        for acc in sum.iter_mut() {
            *acc /= rounds as f64;
        }

        let waveform = preamble.scale(&sum, source.mnemonic());
        self.session().check_error_queue()?;
        Ok(waveform)
    }

    /// Steps 1-4 of the transfer protocol: source selection, encoding
    /// configuration, completion handshake and preamble fetch. The returned
    /// preamble is valid only until the next configuration change.
    fn prepare_transfer(&mut self, source: WaveformSource) -> Result<WaveformPreamble, ScopeError> {
        let transfer = self.transfer_encoding();

        if let WaveformSource::Channel(ch) = source {
            let select = command::set("select", ch.subsystem(), ParamValue::Flag(true))?;
            self.session().send(&select)?;
        }
        let config = [
            command::set(
                "data",
                "source",
                ParamValue::Token(source.mnemonic().to_string()),
            )?,
            command::set(
                "data",
                "encoding",
                ParamValue::Token(transfer.encdg_mnemonic().to_string()),
            )?,
            command::set(
                "wfmoutpre",
                "byte_width",
                ParamValue::Int(transfer.byte_width as i64),
            )?,
            command::set("data", "width", ParamValue::Int(transfer.byte_width as i64))?,
        ];
        for request in &config {
            self.session().send(request)?;
        }

        // Transfer the full record.
        let record_length = self.record_length()?;
        let range = [
            command::set("data", "start", ParamValue::Int(1))?,
            command::set("data", "stop", ParamValue::Int(record_length.max(1) as i64))?,
        ];
        for request in &range {
            self.session().send(request)?;
        }
        self.session().check_error_queue()?;

        // Let pending acquisition and configuration settle before reading.
        self.session().wait_operation_complete()?;

        let reply = self.session().query(&command::query_subsystem("wfmoutpre")?)?;
        let preamble = WaveformPreamble::parse(&reply)?;

        if preamble.encoding != Encoding::Binary {
            return Err(ScopeError::UnexpectedResponseShape(
                "instrument reports ASCII curve encoding after binary was requested".to_string(),
            ));
        }
        if preamble.byte_width != transfer.byte_width {
            warn!(
                "instrument kept byte width {} after {} was requested",
                preamble.byte_width, transfer.byte_width
            );
        }
        Ok(preamble)
    }

    /// Step 5: read the `CURVE?` binary block and decode it to raw codes
    /// using the preamble as explicit context.
    fn read_curve(&mut self, preamble: &WaveformPreamble) -> Result<Vec<f64>, ScopeError> {
        let payload = self.session().query_block(&ScpiRequest::query("CURVE?"))?;
        preamble.decode_codes(&payload)
    }
}
