#![no_main]
use libfuzzer_sys::fuzz_target;
use plugin_pack::Processor;

fuzz_target!(|data: &[u8]| {
    let processor = Processor::standard().unwrap();
    // Anything that unpacks must pack back to the same bytes
    if let Ok(bundle) = processor.unpack_bytes("fuzz", data) {
        assert_eq!(processor.pack(&bundle).unwrap(), data);
    }
});
