use rand::seq::SliceRandom;
use rand::Rng;

pub const ECO_FACTS: [&str; 12] = [
    "One tree can absorb up to 48 pounds of CO2 per year!",
    "Recycling one aluminum can saves enough energy to run a TV for 3 hours.",
    "About 70% of the Earth's surface is covered by oceans.",
    "Wind turbines can generate enough electricity for 1,400 homes.",
    "Solar panels can last for 25-30 years with proper maintenance.",
    "Bamboo grows up to 35 inches per day!",
    "A single bee can visit up to 5,000 flowers in a single day.",
    "The Great Barrier Reef is the largest living structure on Earth.",
    "Electric vehicles produce zero direct emissions, helping reduce air pollution.",
    "Planting one acre of forest absorbs the same amount of carbon as driving a car 26,000 miles.",
    "About 80% of ocean pollution comes from land-based activities.",
    "Using reusable bags can save up to 700 plastic bags per person annually.",
];

/// 每次配对成功时随机挑一条环保知识。
pub fn next_fact<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    ECO_FACTS.choose(rng).copied().unwrap_or(ECO_FACTS[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn facts_come_from_the_fixed_list_and_vary() {
        let mut rng = SmallRng::seed_from_u64(42);
        let picked: HashSet<&str> = (0..200).map(|_| next_fact(&mut rng)).collect();
        assert!(picked.iter().all(|fact| ECO_FACTS.contains(fact)));
        assert!(picked.len() > 6);
    }
}
