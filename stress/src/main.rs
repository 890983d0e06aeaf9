use cassandra_stress_runner::prelude::*;

fn main() -> StressResult<()> {
    let cli = init();
    run(cli)
}
