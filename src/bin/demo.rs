use std::{
    env,
    error::Error,
    ffi::OsString,
    fs::File,
    io::{BufWriter, Write},
};

#[cfg(feature = "std")]
fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<OsString> = env::args_os().collect();

    if args.len() < 3 {
        println!(
            "Usage: {} input output [predicted_size]",
            args[0].to_string_lossy()
        );
        return Ok(());
    }

    let inp_fn = &args[1];
    let outp_fn = &args[2];
    let predicted_size = match args.get(3) {
        Some(sz) => match sz.to_str().and_then(|sz| sz.parse::<usize>().ok()) {
            Some(sz) => sz,
            None => {
                println!("Invalid predicted size {}", sz.to_string_lossy());
                return Ok(());
            }
        },
        None => 0,
    };

    let inp = std::fs::read(inp_fn)?;
    let outp = treeflate::decompress(&inp, predicted_size)?;

    let mut outp_f = BufWriter::new(File::create(outp_fn)?);
    outp_f.write_all(&outp)?;
    outp_f.flush()?;

    Ok(())
}

#[cfg(not(feature = "std"))]
fn main() {
    println!("Demo requires std feature");
}
