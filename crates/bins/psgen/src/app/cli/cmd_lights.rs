use crate::{
    app::Config,
    dataset::light_key,
    light::{self, LightPattern, LightSpec},
};
use base::Error;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
#[clap(about = "Print the positions of a light pattern.")]
pub struct LightsOptions {
    #[clap(value_enum, default_value_t = LightPattern::Hemisphere, help = "Light distribution")]
    pub pattern: LightPattern,

    #[clap(short = 'n', long, default_value_t = 4, help = "Number of lights")]
    pub count: usize,

    #[clap(short, long, default_value_t = 2.0, help = "Distance of the lights to the origin")]
    pub distance: f64,

    #[clap(long, help = "Print the lights of a YAML light list instead")]
    pub file: Option<PathBuf>,
}

pub fn lights(opts: LightsOptions, config: Config) -> Result<(), Error> {
    if let Some(file) = &opts.file {
        let specs = light::load_light_list(config.resolve_path(file))?;
        for (i, spec) in specs.iter().enumerate() {
            match spec {
                LightSpec::Point { position, intensity } => println!(
                    "{}: point [{:.6}, {:.6}, {:.6}] intensity {:?}",
                    light_key(i + 1),
                    position.x,
                    position.y,
                    position.z,
                    intensity
                ),
                LightSpec::Directional {
                    direction,
                    intensity,
                } => println!(
                    "{}: directional [{:.6}, {:.6}, {:.6}] intensity {:?}",
                    light_key(i + 1),
                    direction.x,
                    direction.y,
                    direction.z,
                    intensity
                ),
            }
        }
        return Ok(());
    }

    let positions = light::sample(opts.pattern, opts.count, opts.distance)?;
    for (i, p) in positions.iter().enumerate() {
        println!(
            "{}: [{:.6}, {:.6}, {:.6}]",
            light_key(i + 1),
            p.x,
            p.y,
            p.z
        );
    }
    Ok(())
}
