/*!

This is the long-form manual for `rule_eval` and `rulebench`.

## Profiles

A profile is a list of distinct ballots, each with the number of voters who
cast it. A ballot lists candidates best first. It may stop before ranking
every candidate: the candidates it does not mention share the last place.

The distortion ratio of a profile measures this truncation:

```text
distortion = 1 - (average length of the distinct ballots) / (number of candidates)
```

## Rules

All the rules score a candidate, higher is better. The elected ranking sorts
the candidates by decreasing score, and by increasing identifier when two
candidates have the same score. `C` is the number of candidates, `f` the
frequency of a ballot and `r` the zero-based position of the candidate in it.

| name | score |
|------|-------|
| `plurality` | sum of `f` over the ballots where `r = 0` |
| `borda` | sum of `f * (C - 1 - r)` |
| `borda_gamma_<g>` | sum of `f * g^r` |
| `dowdall` | sum of `f * (C - 1 - r) / (r + 1)` |
| `veto` | minus the voters who rank the candidate last (or leave it out of a truncated ballot) |
| `k_approval_k_<k>` | sum of `f` over the ballots where `r < k` |
| `copeland` | pairwise wins minus pairwise losses |
| `maximin` | the smallest winning pairwise count (0 for a lost or tied contest) |
| `simpson` | the smallest net pairwise margin |
| `borda_veto_hybrid` | `veto` if the distortion ratio is at least 0.8, `borda` otherwise |
| `kemeny` | `C - position` in the exact Kemeny consensus |
| `borda_kemeny_hybrid` | `kemeny` over the best Borda candidates, the others below in Borda order |
| `stv` | the round in which the candidate is eliminated, `C` for the winner |

The pairwise rules only compare two candidates on the ballots that rank both.

### `kemeny`

The consensus is the ranking with the smallest number of weighted pairwise
disagreements with the ballots. All the rankings are tried, so the profile may
have at most `kemeny_max_candidates` candidates (9 by default). When several
rankings are optimal, the first one in lexicographic order of the candidate
identifiers is chosen. The solver keeps the scores of recent profiles in
memory.

### `stv`

In each round, every ballot counts for its highest candidate still in the
race. The candidate with the lowest count is eliminated. Ties are broken by
eliminating the lowest identifier, or with a seeded hash of the round and the
candidates when `tiebreakMode` is `random`.

## Utility

For every voter, and the elected ranking `E`:
 - `top` is 1 if the first choice of the voter is `E[0]`, 0 otherwise. With the
   `reciprocalRank` scheme, it is `1 / (1 + p)` where `p` is the position of
   `E[0]` in the ballot.
 - `topn` is the fraction of the first `n` choices of the voter that are among
   the first `n` candidates of `E`.

Both are averaged over the voters.

## Configuration

`rulebench` reads a run description in JSON:

```json
{
  "profile": [
    {"frequency": 5, "ballot": [1, 2, 3]},
    {"frequency": 6, "ballot": [3, 2, 1]}
  ],
  "candidates": [1, 2, 3],
  "rules": ["plurality", "copeland"],
  "topn": 1,
  "tiebreakMode": "lowestCandidate",
  "utilityScheme": "firstChoice"
}
```

Instead of `profile`, a `generator` section builds a synthetic profile:

```json
{
  "generator": {
    "model": "spatial",
    "voters": 1000,
    "candidates": 6,
    "seed": 42,
    "distortionRatio": 0.5
  },
  "rules": ["borda", "stv"],
  "topn": 2
}
```

The models are `random`, `spatial` and `dirichlet`. `candidates` (optional)
registers candidates that may receive no vote. `tiebreakMode` is
`lowestCandidate` (default) or `random`, in which case `randomSeed` (a string
holding an integer) is required. `utilityScheme` is `firstChoice` (default) or
`reciprocalRank`. If `rules` is empty, all the standard rules are evaluated,
except the exhaustive ones that cannot handle the number of candidates: they are
skipped with a warning. A rule named explicitly that cannot handle the profile
is an error.

 */
