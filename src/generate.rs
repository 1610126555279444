use std::{time::{SystemTime, UNIX_EPOCH}, fs::File, io::Write};

use clap::{Args, ValueEnum};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use rand_distr::{Uniform, Normal, Distribution};

use crate::error::InstanceError;
use crate::instance::{Flight, FlightCatalog, SeparationMatrix, Time};
use crate::parser::write_airland;

/// Value written on the diagonal of the separation matrix, as OR-Library does.
const NO_SEPARATION: Time = 99999.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InstanceFormat {
    Airland,
    Json,
}

#[derive(Debug, Args)]
pub struct AlpGenerator {
    /// An optional seed to kickstart the instance generation
    #[clap(short='s', long)]
    seed: Option<u128>,
    /// The number of flights
    #[clap(short='n', long, default_value="10")]
    nb_flights: usize,
    /// The number of aircraft classes
    #[clap(short='k', long, default_value="4")]
    nb_classes: usize,
    /// The number of clusters of similar classes
    #[clap(short='c', long, default_value="2")]
    nb_clusters: usize,
    /// The minimum separation position used to generate the pairwise separation times
    #[clap(long, default_value="0")]
    min_separation_position: isize,
    /// The maximum separation position used to generate the pairwise separation times
    #[clap(long, default_value="12")]
    max_separation_position: isize,
    /// The std deviation of the separation positions among a cluster
    #[clap(long, default_value="2")]
    separation_position_std_dev: isize,
    /// Separation added to every pair of distinct flights
    #[clap(long, default_value="3")]
    base_separation: isize,
    /// The average time between two flight appearances
    #[clap(long, default_value="30")]
    avg_interarrival_time: isize,
    /// Minimum time between the appearance of a flight and its target landing time
    #[clap(long, default_value="60")]
    min_lead_time: isize,
    /// Maximum time between the appearance of a flight and its target landing time
    #[clap(long, default_value="120")]
    max_lead_time: isize,
    /// Maximum time a flight can land ahead of its target
    #[clap(long, default_value="40")]
    max_speedup: isize,
    /// Maximum time a flight can land after its target
    #[clap(long, default_value="300")]
    max_delay: isize,
    /// Maximum earliness/lateness penalty per time unit
    #[clap(long, default_value="10")]
    max_penalty: isize,
    /// Freeze time announced in the instance header
    #[clap(long, default_value="20")]
    freeze_time: isize,
    /// Format of the generated instance
    #[clap(short, long, value_enum, default_value="airland")]
    format: InstanceFormat,
    /// Name of the file where to generate the instance
    #[clap(short, long)]
    output: Option<String>,
}

impl AlpGenerator {

    pub fn generate(&mut self) -> Result<(), InstanceError> {
        let mut rng = self.rng();
        let catalog = self.catalog(&mut rng)?;

        let instance = match self.format {
            InstanceFormat::Airland => write_airland(&catalog),
            InstanceFormat::Json => serde_json::to_string_pretty(&catalog)?,
        };

        if let Some(output) = self.output.as_ref() {
            File::create(output)?.write_all(instance.as_bytes())?;
        } else {
            println!("{instance}");
        }
        Ok(())
    }

    pub fn catalog(&self, rng: &mut impl Rng) -> Result<FlightCatalog, InstanceError> {
        let nb_clusters = self.nb_clusters.clamp(1, self.nb_classes());
        let mut nb_classes_per_cluster = vec![self.nb_classes() / nb_clusters; nb_clusters];
        for i in 0..(self.nb_classes() % nb_clusters) {
            nb_classes_per_cluster[i] += 1;
        }

        let classes = self.generate_classes(rng);
        let class_separation = self.generate_separation_costs(rng, &nb_classes_per_cluster);
        let appearance = self.generate_appearance(rng);

        let flights = appearance.iter()
            .copied()
            .enumerate()
            .map(|(id, appearance)| self.generate_flight(rng, id, appearance))
            .collect();

        let rows = (0..self.nb_flights)
            .map(|i| (0..self.nb_flights)
                .map(|j| if i == j {
                    NO_SEPARATION
                } else {
                    (self.base_separation + class_separation[classes[i]][classes[j]]) as Time
                })
                .collect())
            .collect();

        FlightCatalog::new(flights, SeparationMatrix::new(rows)?, self.freeze_time as Time)
    }

    fn generate_separation_costs(&self, rng: &mut impl Rng, nb_classes_per_cluster: &[usize]) -> Vec<Vec<isize>> {
        let nb_clusters = nb_classes_per_cluster.len();
        let mut members = vec![vec![]; nb_clusters];
        let mut t = 0_usize;
        for (i, n) in nb_classes_per_cluster.iter().copied().enumerate() {
            for _ in 0..n {
                members[i].push(t);
                t += 1;
            }
        }

        let mut separation_costs = vec![vec![0; self.nb_classes()]; self.nb_classes()];

        let rand_centroid = Uniform::new_inclusive(self.min_separation_position, self.max_separation_position.max(self.min_separation_position));

        for a in 0..nb_clusters {
            let centroid_a = rand_centroid.sample(rng);
            let positions_a = self.positions(rng, centroid_a, nb_classes_per_cluster[a]);

            for b in 0..nb_clusters {
                let positions_b = if a == b {
                    positions_a.clone()
                } else {
                    let centroid_b = rand_centroid.sample(rng);
                    self.positions(rng, centroid_b, nb_classes_per_cluster[b])
                };

                for (i, ti) in members[a].iter().copied().enumerate() {
                    for (j, tj) in members[b].iter().copied().enumerate() {
                        separation_costs[ti][tj] = positions_a[i].abs_diff(positions_b[j]) as isize;
                    }
                }
            }
        }

        separation_costs
    }

    fn positions(&self, rng: &mut impl Rng, centroid: isize, n: usize) -> Vec<isize> {
        match Normal::new(centroid as f64, self.separation_position_std_dev.max(0) as f64) {
            Ok(dist) => (0..n).map(|_| dist.sample(rng).round() as isize).collect(),
            Err(_) => vec![centroid; n],
        }
    }

    fn generate_classes(&self, rng: &mut impl Rng) -> Vec<usize> {
        let rand_class = Uniform::new(0, self.nb_classes());
        (0..self.nb_flights).map(|_| rand_class.sample(rng)).collect()
    }

    fn generate_appearance(&self, rng: &mut impl Rng) -> Vec<Time> {
        let mut appearance = vec![];

        let rand = Uniform::<f64>::new(f64::EPSILON, 1.0);

        for i in 0..self.nb_flights {
            let previous = if i == 0 { 0 } else { appearance[i - 1] };
            appearance.push(previous + (- rand.sample(rng).ln() * self.avg_interarrival_time as f64).round() as isize);
        }

        appearance.into_iter().map(|a| a as Time).collect()
    }

    fn generate_flight(&self, rng: &mut impl Rng, id: usize, appearance: Time) -> Flight {
        let lead = Uniform::new_inclusive(self.min_lead_time, self.max_lead_time.max(self.min_lead_time));
        let speedup = Uniform::new_inclusive(0, self.max_speedup.max(0));
        let delay = Uniform::new_inclusive(0, self.max_delay.max(0));
        let penalty = Uniform::new_inclusive(1, self.max_penalty.max(1));

        let target = appearance + lead.sample(rng) as Time;
        let earliest = (target - speedup.sample(rng) as Time).max(appearance);
        let latest = target + delay.sample(rng) as Time;

        Flight {
            id,
            appearance,
            earliest,
            target,
            latest,
            early_rate: penalty.sample(rng) as Time,
            late_rate: penalty.sample(rng) as Time,
        }
    }

    fn nb_classes(&self) -> usize {
        self.nb_classes.max(1)
    }

    fn rng(&self) -> impl Rng {
        let init = self.seed.unwrap_or_else(|| SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or_default());
        let mut seed = [0_u8; 32];
        seed.iter_mut().zip(init.to_be_bytes().into_iter()).for_each(|(s, i)| *s = i);
        seed.iter_mut().rev().zip(init.to_le_bytes().into_iter()).for_each(|(s, i)| *s = i);
        ChaChaRng::from_seed(seed)
    }

}
