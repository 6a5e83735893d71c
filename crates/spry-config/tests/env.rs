//! Environment overrides run in their own test binary so `SPRY_PORT` never
//! leaks into the discovery tests.

use spry_config::{ConfigDiscovery, ConfigOverrides};

#[test]
fn env_port_overrides_file() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("spry.toml", "port = 3000\n")?;
        jail.set_env("SPRY_PORT", "4555");

        let config = ConfigDiscovery::new(jail.directory())
            .load(&ConfigOverrides::default())
            .expect("config should load");
        assert_eq!(config.port, 4555);
        Ok(())
    });
}
