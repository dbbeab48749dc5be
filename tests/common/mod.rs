use std::io::{Cursor, Write};
use std::sync::Once;
use zip::write::SimpleFileOptions;

static INIT: Once = Once::new();

pub fn init_logger() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Zip `entries` in memory. Names ending in `/` become directory entries.
pub fn build_pack(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for (name, payload) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(*name, options)
                .expect("Failed to add directory entry");
        } else {
            writer
                .start_file(*name, options)
                .expect("Failed to start file entry");
            writer.write_all(payload).expect("Failed to write payload");
        }
    }

    writer
        .finish()
        .expect("Failed to finish pack")
        .into_inner()
}
