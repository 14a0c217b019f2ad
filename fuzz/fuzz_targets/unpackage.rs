#![no_main]
use flowfile_pack::Unpackager;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut input = data;
    let mut unpackager = Unpackager::new();
    while unpackager.unpackage(&mut input).is_ok() {
        if unpackager.get_data(&mut input, &mut std::io::sink()).is_err() {
            break;
        }
    }
});
