use assert_approx_eq::assert_approx_eq;
use pulsetools::acceptance::ChannelCounters;
use pulsetools::codec::{self, Family};
use pulsetools::correlate::Correlator;
use pulsetools::engine::Engine;
use pulsetools::hist::Histogram;
use pulsetools::rate::{BurstDiagnostics, RateReporter};
use pulsetools::slots::SlotTable;
use pulsetools::{de, Coincidence};
use std::time::{Duration, Instant};

mod common;
use common::*;

fn engine(run: &pulsetools::cfg::Run) -> Engine {
    let mut e = Engine::new(run).unwrap();
    e.on_run_start(Instant::now());
    e
}

/// `timing_run` on the QDC, every channel at zero threshold
fn qdc_timing_run() -> pulsetools::cfg::Run {
    let mut run = timing_run(1.0);
    run.family = Family::Mqdc32;
    run.max_value = None;
    run.channel_settings.clear();
    run
}

/// One matched pulse above threshold is accepted and histogrammed at its
/// amplitude
#[test]
fn scenario_a_single_accepted_pulse() {
    let mut e = engine(&pha_run());
    let summary = e.process_burst(&[pulse(0, 500, Coincidence::Matched, 0)]);
    assert_eq!(1, summary.accepted);
    assert_eq!(1, e.totals()[0].accepted);
    let h = e.energy_histogram(0).unwrap();
    assert_eq!(1, h.entries());
    assert_eq!(1, h.counts()[500]);
}

/// A matched pulse below threshold is in-window pile-up
#[test]
fn scenario_b_below_threshold() {
    let mut e = engine(&pha_run());
    e.process_burst(&[pulse(0, 50, Coincidence::Matched, 0)]);
    let cts = e.totals()[0];
    assert_eq!(1, cts.in_window_pileup);
    assert_eq!(0, cts.accepted);
    assert_eq!(1, cts.trigger);
    assert_eq!(1, cts.pileup);
    assert_eq!(0, e.energy_histogram(0).unwrap().entries());
}

/// Reference on channel 4 and signal on channel 0 share slot 7
#[test]
fn scenario_c_time_difference_in_slot_7() {
    let tick_scale = 4.0;
    let h = Histogram::new(200, -50.0, 50.0).unwrap();
    let mut c = Correlator::new(vec![4], vec![0], 0.001, tick_scale, h);
    let mut table = SlotTable::new(1024, 8);
    table.insert(measurement(4, 7, 0, 1000, 0)).unwrap();
    table.insert(measurement(0, 7, 0, 1002, 500)).unwrap();
    table.mark_good(7);

    assert_eq!(1, c.correlate(&mut table));
    let dt = (1002.5 - 1000.0) * tick_scale;
    let hist = c.histogram(0).unwrap();
    assert_eq!(1, hist.entries());
    assert_eq!(1, hist.counts()[hist.index(dt).unwrap()]);

    // A repeat scan finds nothing
    assert!(!table.is_good(7));
    assert_eq!(0, c.correlate(&mut table));
    assert_eq!(1, c.histogram(0).unwrap().entries());
}

/// The same through the whole engine: on the digitizer the slot is the
/// pulse's position in its channel, so slot 7 is each channel's 8th pulse
#[test]
fn scenario_c_through_engine() {
    let tick_scale = 4.0;
    let mut e = engine(&timing_run(tick_scale));
    let mut burst = vec![pha_header(), time_tag(900)];
    for _ in 0..7 {
        // Below threshold: counted, never stored
        burst.push(pulse(4, 10, Coincidence::Matched, 0));
        burst.push(pulse(0, 10, Coincidence::Matched, 0));
    }
    burst.push(time_tag(1000));
    burst.push(pulse(4, 800, Coincidence::Matched, 0));
    burst.push(time_tag(1002));
    burst.push(pulse(0, 900, Coincidence::Matched, 500));
    let n = burst.len() as u32 + 1;
    burst.push(pha_trailer(n));

    let summary = e.process_burst(&burst);
    assert!(!summary.truncated);
    assert_eq!(2, summary.accepted);
    assert_eq!(1, summary.correlated);
    let hist = e.time_histogram(0).unwrap();
    assert_eq!(1, hist.entries());
    assert_eq!(1, hist.counts()[hist.index(10.0).unwrap()]);
    assert!(!e.is_good(7));
}

/// A trailer declaring five words after only three is a truncated burst
#[test]
fn scenario_d_truncated_burst() {
    let mut e = engine(&pha_run());
    let burst = [
        pha_header(),
        pulse(0, 500, Coincidence::Matched, 0),
        pha_trailer(5),
    ];
    let summary = e.process_burst(&burst);
    assert!(summary.truncated);
    assert_eq!(0, summary.accepted);
    assert_eq!(0, e.totals()[0].accepted);
    assert_eq!(0, e.totals()[0].trigger);
    assert_eq!(0, e.energy_histogram(0).unwrap().entries());
    assert_eq!(1, e.diagnostics().truncated_bursts);

    // The loop carries on with the next burst
    e.process_burst(&[pulse(0, 500, Coincidence::Matched, 0)]);
    assert_eq!(1, e.totals()[0].accepted);
}

/// A QDC event shorter than its header declares is dropped whole
#[test]
fn mqdc32_truncated_event() {
    let mut e = engine(&qdc_timing_run());
    let burst = [qdc_header(5), qdc_data(0, 1000), qdc_eoe(40)];
    let summary = e.process_burst(&burst);
    assert!(summary.truncated);
    assert_eq!(0, summary.accepted);
    assert_eq!(0, e.totals()[0].trigger);
    assert_eq!(1, e.diagnostics().truncated_bursts);

    e.process_burst(&[qdc_header(2), qdc_data(0, 1000), qdc_eoe(40)]);
    assert_eq!(1, e.totals()[0].accepted);
}

/// Rates are counts per elapsed millisecond, and everything is zero after
#[test]
fn scenario_e_rate_report() {
    let t0 = Instant::now();
    let interval = Duration::from_secs(1);
    let mut r = RateReporter::new(interval, t0);
    let mut cts = vec![ChannelCounters { trigger: 100, accepted: 80, ..Default::default() }; 2];
    let mut diag = BurstDiagnostics { bursts: 3, ..Default::default() };

    let report = r.report(t0 + interval, &[0, 1], &mut cts, &mut diag).unwrap();
    assert_approx_eq!(1000.0, report.elapsed_ms);
    assert_approx_eq!(100.0 / 1000.0, report.channels[0].trigger_rate);
    assert_approx_eq!(80.0 / 1000.0, report.channels[0].accepted_rate);
    assert_eq!(3, report.diagnostics.bursts);

    assert!(cts.iter().all(|c| *c == ChannelCounters::default()));
    assert_eq!(BurstDiagnostics::default(), diag);
    // The window restarted at the report
    assert!(r.report(t0 + interval + Duration::from_millis(10), &[0], &mut cts, &mut diag).is_none());
}

/// Engine-level cadence with window counters zeroed and run totals kept
#[test]
fn engine_reports_reset_window_only() {
    let run = pha_run();
    let mut e = Engine::new(&run).unwrap();
    let t0 = Instant::now();
    e.on_run_start(t0);
    e.process_burst(&[pulse(2, 500, Coincidence::Matched, 0), pulse(2, 20, Coincidence::Unmatched, 0)]);
    assert!(e.poll_report(t0 + Duration::from_millis(500)).is_none());

    let report = e.poll_report(t0 + run.report_interval).unwrap();
    let ch2 = report.channels.iter().find(|c| c.channel == 2).unwrap();
    assert_approx_eq!(0.002, ch2.trigger_rate);
    assert_approx_eq!(50.0, ch2.out_window_pileup_pct);
    assert_eq!(ChannelCounters::default(), e.window_counters()[2]);
    assert_eq!(2, e.totals()[2].trigger);
}

/// Replaying a burst doubles every counter and histogram
#[test]
fn replay_doubles_everything() {
    let mut e = engine(&timing_run(1.0));
    let burst = codec::encode_burst(Family::DppPha, &[
        measurement(4, 0, 700, 100, 0),
        measurement(0, 0, 900, 103, 250),
        measurement(1, 0, 30, 103, 0),
        measurement(0, 1, 50, 110, 0),
    ]).unwrap();
    e.process_burst(&burst);
    let once = e.snapshot();
    e.process_burst(&burst);
    let twice = e.snapshot();

    for (a, b) in once.totals.iter().zip(twice.totals.iter()) {
        let c = a.counters;
        let d = b.counters;
        assert_eq!(
            (2 * c.trigger, 2 * c.accepted, 2 * c.in_window_pileup, 2 * c.out_window_pileup, 2 * c.pileup),
            (d.trigger, d.accepted, d.in_window_pileup, d.out_window_pileup, d.pileup),
        );
    }
    for (a, b) in once.energy.iter().chain(once.time.iter()).zip(twice.energy.iter().chain(twice.time.iter())) {
        assert_eq!(2 * a.histogram.entries(), b.histogram.entries());
        for (x, y) in a.histogram.counts().iter().zip(b.histogram.counts().iter()) {
            assert_eq!(2 * x, *y);
        }
    }
    assert_eq!(1, once.time[0].histogram.entries());
    assert_eq!(2 * once.diagnostics.words, twice.diagnostics.words);
}

/// Accepted exactly when above threshold, below the ceiling, and matched;
/// only accepted pulses reach the energy histogram
#[test]
fn acceptance_property() {
    let flags = [Coincidence::Matched, Coincidence::Unmatched, Coincidence::Neither];
    for &amplitude in [0u32, 99, 100, 101, 500, 16382, 16383].iter() {
        for &flag in flags.iter() {
            let mut run = pha_run();
            run.max_value = Some(16383);
            let mut e = engine(&run);
            e.process_burst(&[pulse(3, amplitude, flag, 0)]);
            let expected = amplitude > THRESHOLD && amplitude < 16383 && flag == Coincidence::Matched;
            let cts = e.totals()[3];
            assert_eq!(expected as u64, cts.accepted, "{} {:?}", amplitude, flag);
            assert_eq!(expected as u64, e.energy_histogram(3).unwrap().entries());
            assert_eq!(1, cts.trigger);
            assert_eq!(cts.trigger, cts.accepted + cts.pileup);
        }
    }
}

/// QDC events take the end-of-event timestamp and their ordinal as slot
#[test]
fn mqdc32_events_correlate() {
    let mut e = engine(&qdc_timing_run());
    let burst = [
        qdc_header(3), qdc_data(4, 1000), qdc_data(0, 2000), qdc_eoe(55),
        qdc_header(2), qdc_data(0, 3000), qdc_eoe(60),
    ];
    let summary = e.process_burst(&burst);
    assert_eq!(3, summary.accepted);
    // Second event has no reference
    assert_eq!(1, summary.correlated);
    let h = e.time_histogram(0).unwrap();
    assert_eq!(1, h.counts()[h.index(0.0).unwrap()]);
}

/// Measurements past the table's capacity are dropped from timing only
#[test]
fn slot_overflow_is_counted() {
    let mut run = timing_run(1.0);
    run.slot_capacity = 1;
    let mut e = engine(&run);
    let burst = codec::encode_burst(Family::DppPha, &[
        measurement(4, 0, 700, 100, 0),
        measurement(0, 0, 900, 100, 0),
        measurement(4, 1, 700, 200, 0),
        measurement(0, 1, 900, 201, 0),
    ]).unwrap();
    let summary = e.process_burst(&burst);
    assert_eq!(4, summary.accepted);
    assert_eq!(1, summary.correlated);
    assert_eq!(2, e.diagnostics().slot_overflows);
}

#[test]
fn run_start_clears_everything() {
    let mut e = engine(&timing_run(1.0));
    e.process_burst(&[pulse(0, 500, Coincidence::Matched, 0), 0xffff_ffff]);
    assert_eq!(1, e.diagnostics().malformed_words);
    e.on_run_start(Instant::now());
    let s = e.snapshot();
    assert!(s.totals.iter().all(|t| t.counters == ChannelCounters::default()));
    assert!(s.energy.iter().all(|h| h.histogram.entries() == 0));
    assert_eq!(BurstDiagnostics::default(), s.diagnostics);
    assert!(s.window.start.is_some());
    assert!(s.window.stop.is_none());

    let end = e.on_run_end();
    let stop = end.window.stop;
    assert!(stop.is_some());
    assert_eq!(stop, e.on_run_end().window.stop);
}

/// A data word outside any event never shares a slot with the next event
#[test]
fn mqdc32_stray_data_is_not_correlated() {
    let mut e = engine(&qdc_timing_run());
    let burst = [qdc_data(0, 1000), qdc_header(2), qdc_data(4, 1000), qdc_eoe(500)];
    let summary = e.process_burst(&burst);
    assert_eq!(1, summary.accepted);
    assert_eq!(0, summary.correlated);
    assert_eq!(1, e.diagnostics().malformed_words);
    assert_eq!(0, e.time_histogram(0).unwrap().ignored());
}

/// Pulse tables encode to QDC events that correlate like hardware ones
#[test]
fn mqdc32_pulse_table_correlates() {
    let table = "0\t4\t100\t0\t800\tm\n0\t0\t100\t0\t900\tm\n0\t0\t130\t0\t900\tm\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_reader(table.as_bytes());
    let pulses: Vec<_> = de::pulses_tsv(&mut rdr, Family::Mqdc32)
        .unwrap()
        .into_iter()
        .map(|(_, m)| m)
        .collect();
    let burst = codec::encode_burst(Family::Mqdc32, &pulses).unwrap();
    let mut e = engine(&qdc_timing_run());
    let summary = e.process_burst(&burst);
    assert_eq!(3, summary.accepted);
    assert_eq!(1, summary.correlated);
    let h = e.time_histogram(0).unwrap();
    assert_eq!(1, h.counts()[h.index(0.0).unwrap()]);
}

/// Time differences stay small across a hardware clock rollover
#[test]
fn correlation_across_rollover() {
    let period = 1u32 << pulsetools::codec::dpp_pha::TIME_TAG.width;
    let mut e = engine(&timing_run(1.0));
    let burst = [
        time_tag(period - 2),
        pulse(4, 500, Coincidence::Matched, 0),
        time_tag(3),
        pulse(0, 500, Coincidence::Matched, 0),
    ];
    assert_eq!(1, e.process_burst(&burst).correlated);
    let h = e.time_histogram(0).unwrap();
    assert_eq!(0, h.ignored());
    assert_eq!(1, h.counts()[h.index(5.0).unwrap()]);
}
