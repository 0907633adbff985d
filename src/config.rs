//! Decoder configuration: everything the pipeline needs that isn't carried
//! by the XTCE document itself (section 5, resource policy).

/// How to react to a packet-level fatal error (section 7 policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningPolicy {
    /// Log the error to the sink and resynchronize to the next packet (default).
    Lenient,
    /// Propagate the first packet-level error instead of skipping it.
    Strict,
}

impl Default for WarningPolicy {
    fn default() -> Self {
        Self::Lenient
    }
}

/// Tunable knobs for a decoding pipeline. Construct with [`DecoderConfig::builder`].
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Number of leading sync-marker bytes the framer skips before each packet.
    pub leading_sync_bytes: usize,
    /// Upper bound on the framer's ring buffer, in bytes.
    pub max_packet_len: usize,
    /// APIDs the caller expects to see; used only to pre-size the reassembler's
    /// per-APID state table; unlisted APIDs are still tracked on demand.
    pub expected_apids: Vec<u16>,
    /// Bytes of secondary header present on every segment after the first,
    /// stripped before the segments are concatenated (section 4.J).
    pub secondary_header_bytes: usize,
    pub warning_policy: WarningPolicy,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            leading_sync_bytes: 0,
            // 7-byte header/length field + maximum declared user-data length.
            max_packet_len: 7 + 65535,
            expected_apids: Vec::new(),
            secondary_header_bytes: 0,
            warning_policy: WarningPolicy::default(),
        }
    }
}

impl DecoderConfig {
    pub fn builder() -> DecoderConfigBuilder {
        DecoderConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct DecoderConfigBuilder {
    config: DecoderConfig,
}

impl DecoderConfigBuilder {
    pub fn leading_sync_bytes(mut self, n: usize) -> Self {
        self.config.leading_sync_bytes = n;
        self
    }

    pub fn max_packet_len(mut self, n: usize) -> Self {
        self.config.max_packet_len = n;
        self
    }

    pub fn expected_apids(mut self, apids: impl IntoIterator<Item = u16>) -> Self {
        self.config.expected_apids = apids.into_iter().collect();
        self
    }

    pub fn secondary_header_bytes(mut self, n: usize) -> Self {
        self.config.secondary_header_bytes = n;
        self
    }

    pub fn warning_policy(mut self, policy: WarningPolicy) -> Self {
        self.config.warning_policy = policy;
        self
    }

    pub fn build(self) -> DecoderConfig {
        self.config
    }
}
