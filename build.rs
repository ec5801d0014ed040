use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let protos = ["lightning.proto"];

    let dir = PathBuf::from("lnrpc");

    let proto_paths: Vec<_> = protos.iter().map(|proto| dir.join(proto)).collect();

    for path in &proto_paths {
        println!("cargo:rerun-if-changed={}", path.display());
    }

    // the server half backs the in-process node used by the integration tests
    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .type_attribute(".", "#[derive(serde::Serialize)]")
        .compile(&proto_paths, &[dir])?;

    Ok(())
}
