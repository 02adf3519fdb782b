//! Closed-form LoRa on-air time calculation.
//!
//! Explicit-header LoRa airtime, as derived in the Semtech/RF wireless
//! world LoRa airtime calculators. Spreading factor must be in `5..=12`
//! and bandwidth must be positive; both are caller preconditions (the
//! modem facade validates them before calling in, see
//! [`crate::modem::facade::Modem`]).
pub fn calculate_airtime(
    spreading_factor: u8,
    bandwidth_hz: u32,
    coding_rate_4: u8,
    preamble_symbols: u32,
    crc: bool,
    low_data_rate_optimize: bool,
    with_header: bool,
    payload_bytes: usize,
) -> f64 {
    debug_assert!((5..=12).contains(&spreading_factor));
    debug_assert!(bandwidth_hz > 0);

    let sf = spreading_factor as f64;
    let bw = bandwidth_hz as f64;
    let cr = coding_rate_4 as f64;

    let t_sym = (2f64).powf(sf) / bw;
    let t_preamble = (preamble_symbols as f64 + 4.25) * t_sym;

    let payload_bits = 8.0 * payload_bytes as f64;
    let ldro_term = if low_data_rate_optimize { 2.0 } else { 0.0 };
    let header_term = if with_header { 0.0 } else { 20.0 };
    let crc_term = if crc { 16.0 } else { 0.0 };

    let n = ((payload_bits - 4.0 * sf + 28.0 + crc_term - header_term)
        / (4.0 * (sf - ldro_term)))
        .ceil();
    let payload_syms = 8.0 + (n * cr).max(0.0);

    t_preamble + payload_syms * t_sym
}
