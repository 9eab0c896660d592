//! `skelenox sample <binary>`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use skel_client::RemoteClient;
use skel_core::{InputFile, LogContext};
use skel_sync::Session;

use super::Globals;

#[derive(Args, Debug)]
pub struct SampleArgs {
    /// The analysed binary.
    pub binary: PathBuf,
}

impl SampleArgs {
    pub fn run(self, globals: &Globals) -> Result<()> {
        let config = globals.load_settings()?;
        let log = LogContext::root("sample");
        let input = InputFile::from_path(&self.binary)
            .with_context(|| format!("cannot hash '{}'", self.binary.display()))?;

        let remote = RemoteClient::connect(&config, log.child("remote"));
        let mut session = Session::new(remote, log.child("session"));
        let sample = session
            .open(&input)
            .with_context(|| format!("failed to register '{}'", self.binary.display()))?;
        session.close();

        println!("{} {} is sample {}", "✓".green(), input.md5, sample);
        Ok(())
    }
}
