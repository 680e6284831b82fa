// https://docs.rs/tonic-build/0.10.2/tonic_build/
// Server stubs are generated too; the test suite runs an in-process service.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_files = &["protocols/file_processor.proto"];
    tonic_build::configure()
        .build_server(true)
        .compile(proto_files, &["protocols"])?;
    Ok(())
}
