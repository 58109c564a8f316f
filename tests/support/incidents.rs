use std::path::Path;

pub const REGENCIES: usize = 10;
pub const YEARS: std::ops::RangeInclusive<i32> = 2018..=2023;
pub const VILLAGES: usize = 4;

/// Write a village-level incident CSV with the default column names.
///
/// Even-numbered regencies report cases in most years, odd ones rarely, so
/// both classes show up in every split.
pub fn write_incident_csv(path: &Path) -> usize {
    write_with_cases(path, |regency, village, roll| {
        if regency % 2 == 0 {
            if village == 0 && roll < 8 { 1 + roll % 3 } else { 0 }
        } else if village == 0 && roll == 0 {
            1
        } else {
            0
        }
    })
}

/// Like [`write_incident_csv`], but the first village of every regency
/// reports cases every year, so every regency-year is at risk.
pub fn write_all_at_risk_csv(path: &Path) -> usize {
    write_with_cases(path, |_, village, roll| if village == 0 { 1 + roll % 3 } else { 0 })
}

fn write_with_cases(path: &Path, mut cases_for: impl FnMut(usize, usize, u64) -> u64) -> usize {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create csv parent dirs");
    }
    let mut writer = csv::Writer::from_path(path).expect("create csv writer");
    writer
        .write_record([
            "id",
            "nama_provinsi",
            "bps_nama_kabupaten_kota",
            "bps_nama_kecamatan",
            "bps_nama_desa_kelurahan",
            "jumlah_kejadian",
            "satuan",
            "tahun",
        ])
        .expect("write header");
    let mut id = 0usize;
    let mut state = 7u64;
    for regency in 0..REGENCIES {
        for year in YEARS {
            for village in 0..VILLAGES {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let roll = (state >> 33) % 10;
                let cases = cases_for(regency, village, roll);
                id += 1;
                writer
                    .write_record([
                        id.to_string(),
                        "JAWA BARAT".to_string(),
                        format!("KABUPATEN {regency:02}"),
                        format!("KECAMATAN {regency:02}-{}", village / 2),
                        format!("DESA {regency:02}-{village}"),
                        cases.to_string(),
                        "KEJADIAN".to_string(),
                        year.to_string(),
                    ])
                    .expect("write record");
            }
        }
    }
    writer.flush().expect("flush csv");
    id
}
