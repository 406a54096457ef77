use pulsetools::codec::{self, Family};
use pulsetools::hist::Histogram;
use pulsetools::{de, ser, Bin, Coincidence};

mod common;

/// Serialize and deserialize bursts written as one frame to the buffer
#[test]
fn bursts_one_frame() {
    let bursts = vec![
        vec![common::pha_header(), common::pulse(0, 500, Coincidence::Matched, 3), common::pha_trailer(3)],
        Vec::new(),
        vec![common::time_tag(77)],
    ];
    let mut b: Vec<u8> = Vec::new();
    ser::bursts(&mut b, &bursts).unwrap();
    let bursts2 = de::bursts(&*b).unwrap();
    assert_eq!(&bursts, &bursts2);
}

/// Serialize and deserialize bursts appended one zstd frame at a time
#[test]
fn bursts_many_frames() {
    let bursts: Vec<Vec<u32>> = (0..5).map(|i| vec![common::time_tag(i); i as usize]).collect();
    let mut b: Vec<u8> = Vec::new();
    for burst in bursts.iter() {
        ser::bursts(&mut b, &[burst.clone()]).unwrap();
    }
    let bursts2 = de::bursts(&*b).unwrap();
    assert_eq!(&bursts, &bursts2);
}

#[test]
fn truncated_recording_is_an_error() {
    let mut b: Vec<u8> = Vec::new();
    ser::bursts_uncompressed(&mut b, &[vec![1, 2, 3]]).unwrap();
    b.truncate(b.len() - 4);
    assert!(de::bursts_uncompressed(&mut &*b).is_err());
    b.truncate(b.len() - 1);
    assert!(de::bursts_uncompressed(&mut &*b).is_err());
}

#[test]
fn histogram_tsv_round_trip() {
    let mut h = Histogram::new(4, 0.0, 8.0).unwrap();
    for v in [1.0, 3.0, 3.5, 7.9] {
        h.fill(v);
    }
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_writer(Vec::new());
    ser::histogram_tsv(&mut wtr, &h).unwrap();
    let buf = wtr.into_inner().unwrap();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_reader(&*buf);
    let bins: Vec<Bin<f64, u64>> = de::histogram_tsv(&mut rdr).unwrap();
    let ys: Vec<u64> = bins.iter().map(|b| b.y).collect();
    let xs: Vec<f64> = bins.iter().map(|b| b.x).collect();
    assert_eq!(vec![1, 2, 0, 1], ys);
    assert_eq!(vec![1.0, 3.0, 5.0, 7.0], xs);
}

fn read_pulses(table: &str, family: Family) -> anyhow::Result<Vec<(u64, pulsetools::Measurement)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(b'\t')
        .from_reader(table.as_bytes());
    de::pulses_tsv(&mut rdr, family)
}

/// Pulse tables group into bursts by their first column, and the n-th
/// pulses of each channel share a slot
#[test]
fn pulses_from_tsv() {
    let table = "0\t0\t100\t0\t500\tm\n0\t4\t100\t250\t600\tu\n0\t0\t110\t0\t650\tm\n1\t0\t120\t0\t700\tm\n";
    let pulses = read_pulses(table, Family::DppPha).unwrap();
    assert_eq!(4, pulses.len());
    let slots: Vec<(u64, u8, usize)> = pulses.iter().map(|(b, m)| (*b, m.channel, m.slot)).collect();
    assert_eq!(vec![(0, 0, 0), (0, 4, 0), (0, 0, 1), (1, 0, 0)], slots);
    assert_eq!(Coincidence::Unmatched, pulses[1].1.coincidence);
    assert_eq!(250, pulses[1].1.fine_time);
}

/// An event column overrides the per-channel ordinal
#[test]
fn pulses_with_events() {
    let table = "0\t4\t100\t0\t800\tm\t7\n0\t0\t100\t0\t900\tm\t7\n0\t0\t140\t0\t900\tm\n";
    let pulses = read_pulses(table, Family::Mqdc32).unwrap();
    let slots: Vec<usize> = pulses.iter().map(|(_, m)| m.slot).collect();
    assert_eq!(vec![7, 7, 0], slots);
}

/// Rows that would not fit the module's words are rejected, not truncated
#[test]
fn pulses_out_of_range() {
    assert!(read_pulses("0\t0\t100\t0\t20000\tm\n", Family::DppPha).is_err());
    assert!(read_pulses("0\t0\t100\t2000\t500\tm\n", Family::DppPha).is_err());
    assert!(read_pulses("0\t8\t100\t0\t500\tm\n", Family::DppPha).is_err());
    assert!(read_pulses("0\t0\t100\t0\t5000\tm\n", Family::Mqdc32).is_err());
    assert!(read_pulses("0\t0\t100\t0\t4000\tm\n", Family::Mqdc32).is_ok());
}

/// One row per word with fixed columns
#[test]
fn words_tsv_rows() {
    let words = codec::encode_burst(Family::DppPha, &[common::measurement(2, 0, 321, 40, 7)]).unwrap();
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_writer(Vec::new());
    ser::words_tsv(&mut wtr, Family::DppPha, 9, &words).unwrap();
    let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
    let rows: Vec<Vec<&str>> = out.lines().map(|l| l.split('\t').collect()).collect();
    assert_eq!(4, rows.len());
    assert!(rows.iter().all(|r| r.len() == 9 && r[0] == "9"));
    let hex = format!("{:08x}", words[1]);
    assert_eq!(vec!["9", "1", hex.as_str(), "GlobalTriggerTime", "", "", "40", "", ""], rows[1]);
    assert_eq!("Measurement", rows[2][3]);
    assert_eq!(("2", "321", "7", "Matched"), (rows[2][4], rows[2][5], rows[2][7], rows[2][8]));
    assert_eq!("4", rows[3][5]);
}
